//! Per-query response returned to the transport layer

use super::{EvidenceChunk, ExternalResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source label used for answers grounded in the uploaded document
pub const UPLOADED_DOCUMENT_SOURCE: &str = "Uploaded Research Paper";

/// Operating mode of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Answer from the vector-indexed paper corpus
    Corpus,
    /// Answer from a single uploaded document
    Document,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Corpus => "corpus",
            Mode::Document => "document",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which branch of the pipeline produced the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    CorpusOnly,
    CorpusPlusExternal,
    CorpusExternalFailed,
    ExternalOnly,
    NoResults,
    DocumentOnly,
    DocumentPlusExternal,
    DocumentExternalFailed,
}

impl ResolutionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMethod::CorpusOnly => "corpus_only",
            ResolutionMethod::CorpusPlusExternal => "corpus_plus_external",
            ResolutionMethod::CorpusExternalFailed => "corpus_external_failed",
            ResolutionMethod::ExternalOnly => "external_only",
            ResolutionMethod::NoResults => "no_results",
            ResolutionMethod::DocumentOnly => "document_only",
            ResolutionMethod::DocumentPlusExternal => "document_plus_external",
            ResolutionMethod::DocumentExternalFailed => "document_external_failed",
        }
    }

    /// Whether external evidence contributed to the answer
    pub fn used_external(&self) -> bool {
        matches!(
            self,
            ResolutionMethod::CorpusPlusExternal
                | ResolutionMethod::ExternalOnly
                | ResolutionMethod::DocumentPlusExternal
        )
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer with full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Final answer text
    pub answer_text: String,

    /// Display strings, ordered by citation number for corpus papers
    pub source_list: Vec<String>,

    pub resolution_method: ResolutionMethod,

    pub mode: Mode,

    /// Corpus chunks the answer was drafted from
    #[serde(default)]
    pub evidence_chunks: Vec<EvidenceChunk>,

    /// External results merged into the answer
    #[serde(default)]
    pub external_results: Vec<ExternalResult>,

    /// Mean similarity of the evidence chunks (0.0 when none)
    #[serde(default)]
    pub avg_relevance_score: f32,

    /// Document reference labels the query asked about
    #[serde(default)]
    pub reference_numbers_used: Vec<String>,
}

impl QueryResponse {
    /// Response with only answer, sources and method set
    pub fn new(
        answer_text: impl Into<String>,
        source_list: Vec<String>,
        resolution_method: ResolutionMethod,
        mode: Mode,
    ) -> Self {
        Self {
            answer_text: answer_text.into(),
            source_list,
            resolution_method,
            mode,
            evidence_chunks: Vec::new(),
            external_results: Vec::new(),
            avg_relevance_score: 0.0,
            reference_numbers_used: Vec::new(),
        }
    }
}
