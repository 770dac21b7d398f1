//! Retrieval collaborator ports
//!
//! Provides:
//! - `VectorIndex`: nearest-neighbour search over the paper corpus
//! - `WebSearcher`: external scholarly/web search

use crate::errors::Result;
use crate::models::{EvidenceChunk, ExternalResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A scored point returned by the vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl VectorHit {
    /// Convert into an evidence chunk; the passage text lives in the
    /// `chunk_text` payload field
    pub fn into_chunk(self) -> EvidenceChunk {
        let text = self
            .payload
            .get("chunk_text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        EvidenceChunk {
            id: self.id,
            text,
            relevance_score: self.score.clamp(0.0, 1.0),
            source_metadata: self.payload,
        }
    }
}

/// Vector database holding embedded paper chunks
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Top-`limit` neighbours of `vector` scoring at least `min_score`,
    /// ordered by descending score
    async fn search(&self, vector: &[f32], limit: usize, min_score: f32) -> Result<Vec<VectorHit>>;

    /// Index backend name
    fn name(&self) -> &str;
}

/// External search provider
#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Up to `limit` results for `query`, tagged as general results
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ExternalResult>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hit_into_chunk() {
        let hit = VectorHit {
            id: "42".to_string(),
            score: 0.81,
            payload: json!({"chunk_text": "Bone density declines", "title": "Bone"})
                .as_object()
                .cloned()
                .unwrap(),
        };
        let chunk = hit.into_chunk();
        assert_eq!(chunk.id, "42");
        assert_eq!(chunk.text, "Bone density declines");
        assert_eq!(chunk.paper_title(), "Bone");
        assert!((chunk.relevance_score - 0.81).abs() < f32::EPSILON);
    }

    #[test]
    fn test_hit_without_text() {
        let hit = VectorHit {
            id: "1".to_string(),
            score: 1.2,
            payload: Map::new(),
        };
        let chunk = hit.into_chunk();
        assert!(chunk.text.is_empty());
        assert_eq!(chunk.relevance_score, 1.0);
    }
}
