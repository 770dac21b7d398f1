//! Evidence units: corpus chunks and external search results

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Title used when chunk metadata carries none
const UNKNOWN_PAPER: &str = "Unknown Paper";

/// Authors label used when chunk metadata carries none
const UNKNOWN_AUTHORS: &str = "Unknown Authors";

/// Authors shown in a source label before truncation
const MAX_LISTED_AUTHORS: usize = 3;

/// A passage retrieved from the paper corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceChunk {
    /// Point/chunk id in the vector index
    pub id: String,

    /// Chunk text
    pub text: String,

    /// Similarity score (0.0 - 1.0)
    pub relevance_score: f32,

    /// Index payload (title, authors, year, ...)
    #[serde(default)]
    pub source_metadata: Map<String, Value>,
}

impl EvidenceChunk {
    /// Paper title from metadata, `Unknown Paper` when absent or blank.
    ///
    /// This is the identity used for citation numbering, so every call site
    /// must go through it.
    pub fn paper_title(&self) -> &str {
        self.source_metadata
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNKNOWN_PAPER)
    }

    /// Author names; accepts either a JSON array or a single string
    pub fn authors(&self) -> Vec<String> {
        match self.source_metadata.get("authors") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
            _ => Vec::new(),
        }
    }

    /// Publication year, normalized
    pub fn year(&self) -> Option<String> {
        self.source_metadata.get("year").and_then(normalize_year)
    }

    /// Display string: `"{title} by {authors} ({year})"`
    pub fn source_label(&self) -> String {
        let authors = self.authors();
        let authors = if authors.is_empty() {
            UNKNOWN_AUTHORS.to_string()
        } else {
            authors
                .iter()
                .take(MAX_LISTED_AUTHORS)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut label = format!("{} by {}", self.paper_title(), authors);
        if let Some(year) = self.year() {
            label.push_str(&format!(" ({})", year));
        }
        label
    }
}

/// Extract the first run of four ASCII digits from a metadata value.
///
/// Numbers are read through their decimal representation. Anything without
/// a four digit run yields `None`.
pub fn normalize_year(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let bytes = raw.as_bytes();
    let mut run_start = 0;
    for (i, b) in bytes.iter().enumerate() {
        if !b.is_ascii_digit() {
            run_start = i + 1;
            continue;
        }
        if i + 1 - run_start == 4 {
            return Some(raw[run_start..=i].to_string());
        }
    }
    None
}

/// Origin of an external result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalResultKind {
    /// General web/scholar search for the query
    General,
    /// Lookup of a numbered reference from the uploaded document
    ReferenceLookup,
}

/// A single web search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
    pub kind: ExternalResultKind,

    /// Reference label this result resolves, for reference lookups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_number: Option<String>,
}

impl ExternalResult {
    /// A general search result
    pub fn general(title: impl Into<String>, link: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            snippet: snippet.into(),
            kind: ExternalResultKind::General,
            reference_number: None,
        }
    }

    /// Re-tag a search hit as the resolution of a document reference
    pub fn into_reference_lookup(self, reference_number: impl Into<String>) -> Self {
        Self {
            kind: ExternalResultKind::ReferenceLookup,
            reference_number: Some(reference_number.into()),
            ..self
        }
    }
}
