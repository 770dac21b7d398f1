//! Numbered reference extraction
//!
//! Finds `[N]` labels followed by a URL or DOI and records the text
//! around the first occurrence of each label as its excerpt.

use quro_common::models::{ReferenceTable, SourceReference};
use regex_lite::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Characters kept from a citation excerpt
const EXCERPT_CHARS: usize = 200;

static URL_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(\d+)\][^\[]*?(https?://[^\s\]]+)").expect("valid url reference pattern")
});

static DOI_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[(\d+)\][^\[]*?doi[:\s]*(10\.\d{4,}/[^\s\],]+)").expect("valid doi reference pattern")
});

/// Drop sentence punctuation a URL or DOI picked up at the end
fn trim_trailing_punctuation(s: &str) -> &str {
    s.trim_end_matches(['.', ',', ';', ')'])
}

/// Build the reference table of a document.
///
/// A later URL for the same label replaces an earlier one. A DOI creates
/// the entry (with a `https://doi.org/` URL) when no URL was found,
/// otherwise it is attached to the existing entry.
pub fn extract_references(text: &str) -> ReferenceTable {
    let mut references = ReferenceTable::new();

    for caps in URL_REFERENCE.captures_iter(text) {
        let number = caps[1].to_string();
        let url = trim_trailing_punctuation(&caps[2]).to_string();
        references.insert(
            number.clone(),
            SourceReference {
                url: Some(url),
                ..SourceReference::new(number)
            },
        );
    }

    for caps in DOI_REFERENCE.captures_iter(text) {
        let number = caps[1].to_string();
        let doi = trim_trailing_punctuation(&caps[2]).to_string();
        references
            .entry(number.clone())
            .and_modify(|reference| reference.doi = Some(doi.clone()))
            .or_insert_with(|| SourceReference {
                url: Some(format!("https://doi.org/{}", doi)),
                doi: Some(doi.clone()),
                ..SourceReference::new(number)
            });
    }

    for (number, reference) in references.iter_mut() {
        reference.citation_excerpt = citation_excerpt(text, number);
    }

    debug!(count = references.len(), "References extracted");
    references
}

/// Text from the first `[number]` up to the next period, newline or label
fn citation_excerpt(text: &str, number: &str) -> Option<String> {
    let pattern = format!(r"\[{}\][^\[]*?(?:[\.\n]|\[\d+\])", number);
    let re = Regex::new(&pattern).ok()?;
    re.find(text)
        .map(|m| m.as_str().chars().take(EXCERPT_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_reference() {
        let text = "Intro text.\nReferences\n[3] https://doi.org/10.1/x\n";
        let references = extract_references(text);

        let reference = &references["3"];
        assert_eq!(reference.number, "3");
        assert_eq!(reference.url.as_deref(), Some("https://doi.org/10.1/x"));
        assert!(reference.doi.is_none());
        assert_eq!(reference.citation_excerpt.as_deref(), Some("[3] https://doi."));
    }

    #[test]
    fn test_doi_creates_url() {
        let text = "[7] Lee, K. Cardiac remodeling. DOI: 10.1016/j.cell.2020.01.001\n";
        let references = extract_references(text);

        let reference = &references["7"];
        assert_eq!(reference.doi.as_deref(), Some("10.1016/j.cell.2020.01.001"));
        assert_eq!(
            reference.url.as_deref(),
            Some("https://doi.org/10.1016/j.cell.2020.01.001")
        );
        assert_eq!(reference.citation_excerpt.as_deref(), Some("[7] Lee, K."));
    }

    #[test]
    fn test_doi_attaches_to_url_reference() {
        let text = "[2] Smith et al https://journal.example/a doi:10.1234/abc\n";
        let references = extract_references(text);

        let reference = &references["2"];
        assert_eq!(reference.url.as_deref(), Some("https://journal.example/a"));
        assert_eq!(reference.doi.as_deref(), Some("10.1234/abc"));
    }

    #[test]
    fn test_trailing_punctuation_trimmed() {
        let references = extract_references("[4] See https://example.org/paper.\n");
        assert_eq!(references["4"].url.as_deref(), Some("https://example.org/paper"));
    }

    #[test]
    fn test_labels_without_links_ignored() {
        let references = extract_references("As shown in [1] and [2], bone loss is rapid.");
        assert!(references.is_empty());
    }

    #[test]
    fn test_excerpt_truncated() {
        let long = "x".repeat(300);
        let text = format!("[5] {} https://example.org/p\n", long);
        let references = extract_references(&text);
        let excerpt = references["5"].citation_excerpt.as_deref().unwrap();
        assert_eq!(excerpt.chars().count(), 200);
        assert!(excerpt.starts_with("[5] xxx"));
    }
}
