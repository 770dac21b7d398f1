//! Scripted collaborator fakes shared by the pipeline tests

use async_trait::async_trait;
use quro_common::errors::{AppError, Result};
use quro_common::llm::{GenerationOptions, Generator};
use quro_common::models::{ExternalResult, ReferenceTable};
use quro_common::retrieval::{VectorHit, VectorIndex, WebSearcher};
use quro_common::{DocumentExtractor, Embedder, ExtractedDocument};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

/// Generator answering per call purpose, recording every prompt
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<HashMap<&'static str, VecDeque<Result<String>>>>,
    calls: Mutex<Vec<(&'static str, String)>>,
    stalled: Mutex<Vec<&'static str>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next call with `purpose`
    pub fn reply(self, purpose: &'static str, text: &str) -> Self {
        self.push(purpose, Ok(text.to_string()));
        self
    }

    /// Queue a transport failure for the next call with `purpose`
    pub fn fail(self, purpose: &'static str) -> Self {
        self.push(
            purpose,
            Err(AppError::Generation {
                message: "connection refused".to_string(),
            }),
        );
        self
    }

    /// Calls with `purpose` never complete
    pub fn stall(self, purpose: &'static str) -> Self {
        self.stalled.lock().unwrap().push(purpose);
        self
    }

    fn push(&self, purpose: &'static str, reply: Result<String>) {
        self.replies
            .lock()
            .unwrap()
            .entry(purpose)
            .or_default()
            .push_back(reply);
    }

    /// Prompts sent for `purpose`, in call order
    pub fn prompts(&self, purpose: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == purpose)
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }

    pub fn call_count(&self, purpose: &str) -> usize {
        self.prompts(purpose).len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((options.purpose, prompt.to_string()));

        let stalled = self.stalled.lock().unwrap().contains(&options.purpose);
        if stalled {
            std::future::pending::<()>().await;
        }

        let queued = self
            .replies
            .lock()
            .unwrap()
            .get_mut(options.purpose)
            .and_then(VecDeque::pop_front);

        match queued {
            Some(reply) => reply,
            None if options.purpose == "judgment" => Ok(
                r#"{"is_sufficient": true, "reasoning": "covered", "confidence": "high"}"#.to_string(),
            ),
            None => Ok(format!("{} output", options.purpose)),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Embedder returning a fixed vector
pub struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.1, 0.2, 0.3])
    }

    fn model_name(&self) -> &str {
        "fixed"
    }

    fn dimension(&self) -> usize {
        3
    }
}

/// Embedder that always fails
pub struct BrokenEmbedder;

#[async_trait]
impl Embedder for BrokenEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(AppError::EmbeddingError {
            message: "model offline".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        "broken"
    }

    fn dimension(&self) -> usize {
        3
    }
}

/// Vector index serving a fixed hit list
pub struct StaticIndex {
    hits: Vec<VectorHit>,
}

impl StaticIndex {
    pub fn new(hits: Vec<VectorHit>) -> Self {
        Self { hits }
    }

    pub fn empty() -> Self {
        Self { hits: Vec::new() }
    }
}

#[async_trait]
impl VectorIndex for StaticIndex {
    async fn search(&self, _vector: &[f32], limit: usize, min_score: f32) -> Result<Vec<VectorHit>> {
        Ok(self
            .hits
            .iter()
            .filter(|h| h.score >= min_score)
            .take(limit)
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Build a hit for paper `title`
pub fn hit(id: &str, title: &str, score: f32) -> VectorHit {
    let payload = json!({
        "chunk_text": format!("Findings from {}", title),
        "title": title,
        "authors": ["Smith", "Jones"],
        "year": 2021
    });
    VectorHit {
        id: id.to_string(),
        score,
        payload: payload.as_object().cloned().unwrap_or_default(),
    }
}

/// Web searcher with canned results that records every query
#[derive(Default)]
pub struct RecordingSearcher {
    results: Vec<ExternalResult>,
    failing: bool,
    queries: Mutex<Vec<String>>,
}

impl RecordingSearcher {
    pub fn with_results(count: usize) -> Self {
        Self {
            results: (1..=count)
                .map(|i| {
                    ExternalResult::general(
                        format!("External {}", i),
                        format!("https://scholar.example/{}", i),
                        format!("Snippet {}", i),
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSearcher for RecordingSearcher {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ExternalResult>> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.failing {
            return Err(AppError::WebSearch {
                message: "provider returned 500".to_string(),
            });
        }
        Ok(self.results.iter().take(limit).cloned().collect())
    }
}

/// Extractor serving one fixed document, or failing
pub struct StaticExtractor {
    document: Option<ExtractedDocument>,
}

impl StaticExtractor {
    pub fn new(text: &str, references: ReferenceTable) -> Self {
        Self {
            document: Some(ExtractedDocument {
                text: text.to_string(),
                references,
            }),
        }
    }

    pub fn failing() -> Self {
        Self { document: None }
    }
}

#[async_trait]
impl DocumentExtractor for StaticExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
        self.document.clone().ok_or_else(|| AppError::Extraction {
            path: path.display().to_string(),
            message: "not a PDF".to_string(),
        })
    }
}

/// Judgment JSON with the given verdict
pub fn judgment(is_sufficient: bool) -> String {
    let value: Value = json!({
        "is_sufficient": is_sufficient,
        "reasoning": "scripted",
        "confidence": "medium"
    });
    value.to_string()
}
