//! Numbered references extracted from an uploaded document

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Characters of a citation excerpt used when building a lookup query
const EXCERPT_QUERY_CHARS: usize = 100;

/// References of one document, keyed by the label as printed (`"3"` for `[3]`)
pub type ReferenceTable = BTreeMap<String, SourceReference>;

/// A bibliography entry of the uploaded document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    /// Label as it appears in the text
    pub number: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    /// Text surrounding the reference label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_excerpt: Option<String>,
}

impl SourceReference {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            ..Default::default()
        }
    }

    /// Search string used to resolve this reference.
    ///
    /// Preference order: explicit URL, DOI, then the excerpt (first 100
    /// characters) followed by the user query. `None` when the reference
    /// carries nothing searchable.
    pub fn lookup_query(&self, query: &str) -> Option<String> {
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            return Some(url.to_string());
        }
        if let Some(doi) = self.doi.as_deref().filter(|d| !d.is_empty()) {
            return Some(doi.to_string());
        }
        self.citation_excerpt
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(|excerpt| {
                let head: String = excerpt.chars().take(EXCERPT_QUERY_CHARS).collect();
                format!("{} {}", head, query)
            })
    }
}
