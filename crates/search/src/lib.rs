//! Quro retrieval adapters
//!
//! Provides:
//! - `QdrantIndex`: corpus search over a Qdrant collection (REST)
//! - `PgVectorIndex`: corpus search over a pgvector table
//! - `SerpApiSearcher`: scholarly web search

mod pgvector;
mod qdrant;
mod serpapi;

pub use pgvector::PgVectorIndex;
pub use qdrant::QdrantIndex;
pub use serpapi::SerpApiSearcher;

use quro_common::config::AppConfig;
use quro_common::db::DbPool;
use quro_common::errors::{AppError, Result};
use quro_common::retrieval::{VectorIndex, WebSearcher};
use std::sync::Arc;
use tracing::info;

/// Create the corpus index selected by `vector_store.provider`
pub async fn create_vector_index(config: &AppConfig) -> Result<Arc<dyn VectorIndex>> {
    let store = &config.vector_store;
    let index: Arc<dyn VectorIndex> = match store.provider.as_str() {
        "qdrant" => Arc::new(QdrantIndex::new(store)?),
        "pgvector" => {
            let database = config.database.as_ref().ok_or_else(|| AppError::Configuration {
                message: "database section is required for the pgvector provider".to_string(),
            })?;
            let pool = Arc::new(DbPool::new(database).await?);
            Arc::new(PgVectorIndex::new(pool, &store.collection)?)
        }
        other => {
            return Err(AppError::Configuration {
                message: format!("Unknown vector store provider: {}", other),
            })
        }
    };

    info!(provider = index.name(), collection = %store.collection, "Vector index ready");
    Ok(index)
}

/// Create the external web searcher
pub fn create_web_searcher(config: &AppConfig) -> Result<Arc<dyn WebSearcher>> {
    if config.web_search.api_key.is_none() {
        tracing::warn!("web_search.api_key not set, external search fallback returns no results");
    }
    Ok(Arc::new(SerpApiSearcher::new(config.web_search.clone())?))
}
