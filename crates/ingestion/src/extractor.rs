//! Uploaded document extraction
//!
//! PDFs go through lopdf on the blocking pool; `.txt` and `.md` files are
//! read as plain text. Either way the reference table is parsed from the
//! extracted text.

use crate::errors::IngestionError;
use crate::pdf::{clean_text, extract_text_from_pdf};
use crate::references::extract_references;
use async_trait::async_trait;
use quro_common::errors::Result;
use quro_common::{DocumentExtractor, ExtractedDocument};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// File formats accepted for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentFormat {
    Pdf,
    PlainText,
}

impl DocumentFormat {
    fn detect(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "txt" | "md" => Some(DocumentFormat::PlainText),
            _ => None,
        }
    }
}

/// Extractor for files on the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FileExtractor;

impl FileExtractor {
    pub fn new() -> Self {
        Self
    }

    async fn read_text(path: &Path) -> std::result::Result<String, IngestionError> {
        let display = path.display().to_string();
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(IngestionError::FileNotFound(display));
        }

        match DocumentFormat::detect(path) {
            Some(DocumentFormat::Pdf) => {
                let owned: PathBuf = path.to_path_buf();
                tokio::task::spawn_blocking(move || extract_text_from_pdf(&owned))
                    .await
                    .map_err(|e| IngestionError::TaskFailed(e.to_string()))?
            }
            Some(DocumentFormat::PlainText) => {
                let raw = tokio::fs::read_to_string(path).await?;
                let text = clean_text(&raw);
                if text.is_empty() {
                    return Err(IngestionError::EmptyDocument(display));
                }
                Ok(text)
            }
            None => Err(IngestionError::UnsupportedFormat(display)),
        }
    }
}

#[async_trait]
impl DocumentExtractor for FileExtractor {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
        let text = Self::read_text(path).await?;
        let references = extract_references(&text);

        info!(
            chars = text.len(),
            references = references.len(),
            "Document extracted"
        );
        Ok(ExtractedDocument { text, references })
    }
}
