//! Document extraction port

use crate::errors::Result;
use crate::models::ReferenceTable;
use async_trait::async_trait;
use std::path::Path;

/// Text and references of an uploaded document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedDocument {
    pub text: String,
    pub references: ReferenceTable,
}

/// Turns an uploaded file into text plus its numbered references.
///
/// Unreadable input is a hard failure (`AppError::Extraction`).
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<ExtractedDocument>;
}
