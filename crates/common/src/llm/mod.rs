//! Text generation client
//!
//! Every call is a stateless single-shot request: the caller supplies the
//! full prompt (history, evidence, instructions) each time.

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Output constraint for a generation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Free text
    Text,
    /// A single JSON object
    Json,
}

/// Per-call generation options
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Pipeline step issuing the call, used as a metrics label
    pub purpose: &'static str,

    /// Temperature (0.0 - 1.0)
    pub temperature: f32,

    /// Maximum output tokens; `None` leaves it to the provider
    pub max_tokens: Option<usize>,

    pub response_format: ResponseFormat,
}

impl GenerationOptions {
    pub fn text(purpose: &'static str, temperature: f32, max_tokens: usize) -> Self {
        Self {
            purpose,
            temperature,
            max_tokens: Some(max_tokens),
            response_format: ResponseFormat::Text,
        }
    }

    pub fn json(purpose: &'static str, temperature: f32) -> Self {
        Self {
            purpose,
            temperature,
            max_tokens: None,
            response_format: ResponseFormat::Json,
        }
    }
}

/// Large-language-model text generator
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for `prompt`
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;

    /// Model identifier
    fn model_name(&self) -> &str;
}

/// Client for OpenAI-compatible chat completion endpoints
pub struct OpenAIGenerator {
    config: LlmConfig,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormatSpec {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatSpec>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAIGenerator {
    /// Create a new generator
    pub fn new(api_key: String, config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create LLM HTTP client: {}", e),
            })?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    async fn call(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are a helpful research assistant.",
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: match options.response_format {
                ResponseFormat::Json => Some(ResponseFormatSpec { kind: "json_object" }),
                ResponseFormat::Text => None,
            },
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::GenerationTimeout {
                        timeout_ms: self.config.timeout_secs * 1000,
                    }
                } else {
                    AppError::Generation {
                        message: format!("LLM API request failed: {}", e),
                    }
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation {
                message: format!("LLM API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| AppError::Generation {
            message: format!("Failed to parse LLM response: {}", e),
        })?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Generation {
                message: "LLM response contained no choices".to_string(),
            })?;

        // An empty completion is a valid (if unhelpful) answer; callers decide the fallback.
        Ok(choice.message.content.unwrap_or_default())
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let start = Instant::now();
        let result = self.call(prompt, options).await;
        metrics::record_generation(options.purpose, start.elapsed().as_secs_f64(), result.is_ok());

        if let Err(ref e) = result {
            tracing::error!(purpose = options.purpose, error = %e, "Generation call failed");
        }
        result
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Offline generator for development without an API key
pub struct MockGenerator;

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        if options.response_format == ResponseFormat::Json {
            return Ok(
                r#"{"is_sufficient": true, "reasoning": "Mock assessment", "confidence": "low"}"#
                    .to_string(),
            );
        }

        let query = prompt
            .lines()
            .find_map(|line| {
                line.trim()
                    .strip_prefix("Current Query:")
                    .or_else(|| line.trim().strip_prefix("User Query:"))
            })
            .map(str::trim)
            .unwrap_or("your question");

        Ok(format!(
            "Based on the provided context, here is an answer about {} [1]. \
            [Mock response - LLM API key not configured]",
            query
        ))
    }

    fn model_name(&self) -> &str {
        "mock-llm"
    }
}

/// Create a generator based on configuration
pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "openai" => {
            let key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
                message: "llm.api_key is required for the openai provider".to_string(),
            })?;
            Ok(Arc::new(OpenAIGenerator::new(key, config.clone())?))
        }
        "mock" => Ok(Arc::new(MockGenerator)),
        other => Err(AppError::Configuration {
            message: format!("Unknown LLM provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.1,
            max_tokens: None,
            response_format: Some(ResponseFormatSpec { kind: "json_object" }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert!(value.get("max_tokens").is_none());
    }

    #[tokio::test]
    async fn test_mock_generator_json() {
        let output = MockGenerator
            .generate("anything", &GenerationOptions::json("judgment", 0.1))
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["is_sufficient"], true);
    }

    #[tokio::test]
    async fn test_mock_generator_echoes_query() {
        let prompt = "History\n\nCurrent Query: muscle loss in space\n\nAnswer:";
        let output = MockGenerator
            .generate(prompt, &GenerationOptions::text("draft", 0.2, 100))
            .await
            .unwrap();
        assert!(output.contains("muscle loss in space"));
    }

    #[test]
    fn test_unknown_provider() {
        let config = LlmConfig {
            provider: "nope".to_string(),
            ..Default::default()
        };
        assert!(create_generator(&config).is_err());
    }
}
