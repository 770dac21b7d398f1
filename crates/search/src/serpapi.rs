//! External scholarly search through SerpAPI

use async_trait::async_trait;
use quro_common::config::WebSearchConfig;
use quro_common::errors::{AppError, Result};
use quro_common::models::ExternalResult;
use quro_common::retrieval::WebSearcher;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// SerpAPI client (Google Scholar engine by default)
pub struct SerpApiSearcher {
    client: reqwest::Client,
    config: WebSearchConfig,
}

#[derive(Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Deserialize)]
struct OrganicResult {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
}

impl OrganicResult {
    fn into_result(self) -> ExternalResult {
        ExternalResult::general(
            self.title.unwrap_or_else(|| "Unknown".to_string()),
            self.link.unwrap_or_default(),
            self.snippet.unwrap_or_else(|| "No description".to_string()),
        )
    }
}

fn parse_results(response: SerpResponse, limit: usize) -> Vec<ExternalResult> {
    response
        .organic_results
        .into_iter()
        .take(limit)
        .map(OrganicResult::into_result)
        .collect()
}

impl SerpApiSearcher {
    pub fn new(config: WebSearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create search HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl WebSearcher for SerpApiSearcher {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ExternalResult>> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            debug!("Web search disabled, no API key configured");
            return Ok(Vec::new());
        };

        let preview: String = query.chars().take(100).collect();
        info!(engine = %self.config.engine, query = %preview, "Performing external search");

        let num = limit.to_string();
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("engine", self.config.engine.as_str()),
                ("q", query),
                ("api_key", api_key),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::WebSearch {
                message: format!("Search request failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(AppError::WebSearch {
                message: format!("Search provider returned {}", response.status()),
            });
        }

        let parsed: SerpResponse = response.json().await.map_err(|e| AppError::WebSearch {
            message: format!("Failed to parse search response: {}", e),
        })?;

        let results = parse_results(parsed, limit);
        info!(results = results.len(), "External search complete");
        Ok(results)
    }
}
