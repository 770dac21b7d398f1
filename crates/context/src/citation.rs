//! Citation bookkeeping
//!
//! Provides:
//! - Paper-level citation numbering for a retrieval set
//! - Deduplicated source lists ordered by citation number
//! - Reference-number extraction from user queries
//! - Citation format auditing of final answers

use quro_common::metrics;
use quro_common::models::EvidenceChunk;
use regex_lite::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;

static REFERENCE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("valid reference pattern"));

static NUMERIC_CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+(?:\s*,\s*\d+)*)\]").expect("valid citation pattern"));

static EXTERNAL_CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[External-(\d+)\]").expect("valid external pattern"));

static PROSE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bchunk\s*\d+\b|\[Paper(?:\s+\d+)?\]").expect("valid prose label pattern")
});

/// Paper title to dense citation number, in first-seen order.
///
/// Rebuilt for every retrieval set; several chunks of one paper share a
/// number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaperCitationMap {
    ids: HashMap<String, usize>,
    titles: Vec<String>,
}

impl PaperCitationMap {
    pub fn build(chunks: &[EvidenceChunk]) -> Self {
        let mut map = Self::default();
        for chunk in chunks {
            let title = chunk.paper_title();
            if !map.ids.contains_key(title) {
                map.titles.push(title.to_string());
                map.ids.insert(title.to_string(), map.titles.len());
            }
        }
        map
    }

    /// Citation number of a paper title
    pub fn id_of(&self, title: &str) -> Option<usize> {
        self.ids.get(title).copied()
    }

    /// Citation number of the paper a chunk belongs to
    pub fn id_for(&self, chunk: &EvidenceChunk) -> Option<usize> {
        self.id_of(chunk.paper_title())
    }

    /// Titles ordered by citation number
    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// One display label per paper, ordered by citation number.
    ///
    /// Each label comes from the first chunk of that paper.
    pub fn source_list(&self, chunks: &[EvidenceChunk]) -> Vec<String> {
        let mut labels: Vec<Option<String>> = vec![None; self.titles.len()];
        for chunk in chunks {
            if let Some(id) = self.id_for(chunk) {
                let slot = &mut labels[id - 1];
                if slot.is_none() {
                    *slot = Some(chunk.source_label());
                }
            }
        }
        labels.into_iter().flatten().collect()
    }
}

/// Bracketed reference numbers in `text`, deduplicated in order of appearance
pub fn extract_reference_numbers(text: &str) -> Vec<String> {
    let mut numbers: Vec<String> = Vec::new();
    for caps in REFERENCE_NUMBER.captures_iter(text) {
        let number = &caps[1];
        if !numbers.iter().any(|n| n == number) {
            numbers.push(number.to_string());
        }
    }
    numbers
}

/// Citation format problems found in an answer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationAudit {
    /// Numeric citations with no corresponding paper
    pub unknown_papers: Vec<usize>,

    /// `[External-N]` citations with no corresponding external result
    pub unknown_external: Vec<usize>,

    /// Prose labels such as "Chunk 2" or "[Paper]"
    pub prose_labels: usize,
}

impl CitationAudit {
    pub fn is_clean(&self) -> bool {
        self.unknown_papers.is_empty() && self.unknown_external.is_empty() && self.prose_labels == 0
    }
}

/// Check the citation contract of a final answer.
///
/// `paper_count` is `None` when numeric citations carry no paper mapping
/// (document mode, where the text may echo the document's own reference
/// labels). Violations are logged and counted, the answer is not altered.
pub fn audit_citations(answer: &str, paper_count: Option<usize>, external_count: usize) -> CitationAudit {
    let mut audit = CitationAudit::default();

    if let Some(paper_count) = paper_count {
        for caps in NUMERIC_CITATION.captures_iter(answer) {
            for number in caps[1].split(',') {
                if let Ok(n) = number.trim().parse::<usize>() {
                    if (n == 0 || n > paper_count) && !audit.unknown_papers.contains(&n) {
                        audit.unknown_papers.push(n);
                    }
                }
            }
        }
    }

    for caps in EXTERNAL_CITATION.captures_iter(answer) {
        if let Ok(n) = caps[1].parse::<usize>() {
            if (n == 0 || n > external_count) && !audit.unknown_external.contains(&n) {
                audit.unknown_external.push(n);
            }
        }
    }

    audit.prose_labels = PROSE_LABEL.find_iter(answer).count();

    if !audit.is_clean() {
        warn!(
            unknown_papers = ?audit.unknown_papers,
            unknown_external = ?audit.unknown_external,
            prose_labels = audit.prose_labels,
            "Answer violates citation format"
        );
        metrics::record_citation_violations("unknown_paper", audit.unknown_papers.len());
        metrics::record_citation_violations("unknown_external", audit.unknown_external.len());
        metrics::record_citation_violations("prose_label", audit.prose_labels);
    }

    audit
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(id: &str, title: &str, authors: &[&str]) -> EvidenceChunk {
        EvidenceChunk {
            id: id.to_string(),
            text: format!("text of {}", id),
            relevance_score: 0.8,
            source_metadata: json!({"title": title, "authors": authors, "year": "2019"})
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    #[test]
    fn test_duplicate_papers_share_number() {
        let chunks = vec![
            chunk("1", "A", &["Ann"]),
            chunk("2", "A", &["Ann"]),
            chunk("3", "B", &["Bob"]),
        ];
        let map = PaperCitationMap::build(&chunks);

        assert_eq!(map.len(), 2);
        assert_eq!(map.id_of("A"), Some(1));
        assert_eq!(map.id_of("B"), Some(2));
        assert_eq!(map.titles(), &["A".to_string(), "B".to_string()]);

        let sources = map.source_list(&chunks);
        assert_eq!(sources, vec!["A by Ann (2019)", "B by Bob (2019)"]);
    }

    #[test]
    fn test_first_occurrence_order() {
        let chunks = vec![
            chunk("1", "C", &[]),
            chunk("2", "A", &[]),
            chunk("3", "C", &[]),
            chunk("4", "B", &[]),
            chunk("5", "A", &[]),
        ];
        let map = PaperCitationMap::build(&chunks);
        assert_eq!(map.id_of("C"), Some(1));
        assert_eq!(map.id_of("A"), Some(2));
        assert_eq!(map.id_of("B"), Some(3));
        assert_eq!(map.source_list(&chunks).len(), 3);
    }

    #[test]
    fn test_missing_titles_collapse() {
        let mut untitled = chunk("1", "", &[]);
        untitled.source_metadata.remove("title");
        let chunks = vec![untitled.clone(), untitled];
        let map = PaperCitationMap::build(&chunks);
        assert_eq!(map.len(), 1);
        assert_eq!(map.id_of("Unknown Paper"), Some(1));
    }

    #[test]
    fn test_extract_reference_numbers() {
        assert_eq!(extract_reference_numbers("summarize [3]"), vec!["3"]);
        assert_eq!(
            extract_reference_numbers("compare [12] with [4] and [12] again"),
            vec!["12", "4"]
        );
        assert!(extract_reference_numbers("no refs [a] here").is_empty());
    }

    #[test]
    fn test_audit_clean_answer() {
        let answer = "Unloading drives atrophy [1][2]. Countermeasures help [1,2] [External-1].";
        let audit = audit_citations(answer, Some(2), 1);
        assert!(audit.is_clean());
    }

    #[test]
    fn test_audit_violations() {
        let answer = "According to Chunk 2, loss is rapid [4]. See [Paper] and [External-3].";
        let audit = audit_citations(answer, Some(2), 1);
        assert_eq!(audit.unknown_papers, vec![4]);
        assert_eq!(audit.unknown_external, vec![3]);
        assert_eq!(audit.prose_labels, 2);
    }

    #[test]
    fn test_audit_document_mode_skips_numeric() {
        let audit = audit_citations("As reference [17] shows", None, 0);
        assert!(audit.is_clean());
    }
}
