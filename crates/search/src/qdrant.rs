//! Qdrant vector index over the REST API
//!
//! Points carry the chunk text and paper metadata in their payload
//! (`chunk_text`, `title`, `authors`, `year`).

use async_trait::async_trait;
use quro_common::config::VectorStoreConfig;
use quro_common::errors::{AppError, Result};
use quro_common::retrieval::{VectorHit, VectorIndex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

/// Qdrant collection client
pub struct QdrantIndex {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    score_threshold: f32,
    with_payload: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

impl ScoredPoint {
    fn into_hit(self) -> VectorHit {
        // Qdrant ids are either unsigned integers or UUID strings
        let id = match self.id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        VectorHit {
            id,
            score: self.score,
            payload: self.payload.unwrap_or_default(),
        }
    }
}

impl QdrantIndex {
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create Qdrant HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn search_url(&self) -> String {
        format!("{}/collections/{}/points/search", self.base_url, self.collection)
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn search(&self, vector: &[f32], limit: usize, min_score: f32) -> Result<Vec<VectorHit>> {
        let body = SearchRequest {
            vector,
            limit,
            score_threshold: min_score,
            with_payload: true,
        };

        let mut request = self.client.post(self.search_url()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send().await.map_err(|e| AppError::Retrieval {
            message: format!("Qdrant request failed: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Retrieval {
                message: format!("Qdrant error {}: {}", status, body),
            });
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| AppError::Retrieval {
            message: format!("Failed to parse Qdrant response: {}", e),
        })?;

        let mut hits: Vec<VectorHit> = parsed.result.into_iter().map(ScoredPoint::into_hit).collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!(collection = %self.collection, hits = hits.len(), "Qdrant search complete");
        Ok(hits)
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_url() {
        let config = VectorStoreConfig {
            url: "http://qdrant:6333/".to_string(),
            collection: "research_papers".to_string(),
            ..Default::default()
        };
        let index = QdrantIndex::new(&config).unwrap();
        assert_eq!(
            index.search_url(),
            "http://qdrant:6333/collections/research_papers/points/search"
        );
    }

    #[test]
    fn test_request_body() {
        let vector = [0.5f32, 0.25];
        let body = serde_json::to_value(SearchRequest {
            vector: &vector,
            limit: 5,
            score_threshold: 0.65,
            with_payload: true,
        })
        .unwrap();
        assert_eq!(body["limit"], 5);
        assert_eq!(body["with_payload"], true);
        assert_eq!(body["vector"], json!([0.5, 0.25]));
    }

    #[test]
    fn test_parse_response() {
        let raw = json!({
            "result": [
                {"id": 42, "version": 3, "score": 0.81,
                 "payload": {"chunk_text": "Bone loss", "title": "Bone", "authors": ["Ng"], "year": 2020}},
                {"id": "9f1c2e3a-0000-4000-8000-000000000000", "version": 1, "score": 0.7}
            ],
            "status": "ok",
            "time": 0.002
        });
        let parsed: SearchResponse = serde_json::from_value(raw).unwrap();
        let hits: Vec<VectorHit> = parsed.result.into_iter().map(ScoredPoint::into_hit).collect();

        assert_eq!(hits[0].id, "42");
        assert_eq!(hits[0].payload["title"], "Bone");
        assert_eq!(hits[1].id, "9f1c2e3a-0000-4000-8000-000000000000");
        assert!(hits[1].payload.is_empty());

        let chunk = hits[0].clone().into_chunk();
        assert_eq!(chunk.text, "Bone loss");
        assert_eq!(chunk.year().as_deref(), Some("2020"));
    }
}
