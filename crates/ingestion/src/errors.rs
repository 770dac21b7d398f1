//! Document intake error types

use quro_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParseError { path: String, message: String },

    #[error("No text content extracted from {0}")]
    EmptyDocument(String),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Extraction task failed: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IngestionError {
    /// Path the error refers to, when known
    pub fn path(&self) -> Option<&str> {
        match self {
            IngestionError::PdfParseError { path, .. }
            | IngestionError::EmptyDocument(path)
            | IngestionError::UnsupportedFormat(path)
            | IngestionError::FileNotFound(path) => Some(path),
            IngestionError::TaskFailed(_) | IngestionError::IoError(_) => None,
        }
    }
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        AppError::Extraction {
            path: e.path().unwrap_or("<unknown>").to_string(),
            message: e.to_string(),
        }
    }
}
