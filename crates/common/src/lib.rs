//! Quro Common Library
//!
//! Shared code for the Quro research assistant crates including:
//! - Core data model (evidence, references, responses)
//! - Embedding and text generation clients
//! - Retrieval and document extraction ports
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod document;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod retrieval;

// Re-export commonly used types
pub use config::AppConfig;
pub use document::{DocumentExtractor, ExtractedDocument};
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use llm::{GenerationOptions, Generator};
pub use retrieval::{VectorHit, VectorIndex, WebSearcher};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
