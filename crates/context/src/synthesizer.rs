//! Answer Synthesizer - Generates cited answers from evidence
//!
//! Provides:
//! - Corpus drafts with paper-level `[N]` citations
//! - Document drafts from a single uploaded paper
//! - Merged answers over primary and external evidence
//! - Search-engine query optimization

use crate::citation::PaperCitationMap;
use crate::sufficiency::INSUFFICIENT_SENTINEL;
use quro_common::errors::Result;
use quro_common::llm::{GenerationOptions, Generator};
use quro_common::models::{EvidenceChunk, ExternalResult, Mode};
use std::sync::Arc;
use tracing::{debug, info};

/// Separator between corpus evidence blocks
const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Placeholder when a merge has no primary evidence
const NO_PRIMARY_EVIDENCE: &str = "No primary evidence was found for this query.";

/// Label each chunk with its paper's citation number
pub fn corpus_evidence_block(chunks: &[EvidenceChunk], citation_map: &PaperCitationMap) -> String {
    chunks
        .iter()
        .map(|chunk| {
            let id = citation_map.id_for(chunk).unwrap_or(0);
            format!("[Paper {}]\n{}", id, chunk.text)
        })
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// `[External Source N]` blocks, numbered from 1
pub fn external_evidence_block(results: &[ExternalResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[External Source {}]\nTitle: {}\nLink: {}\nContent: {}",
                i + 1,
                r.title,
                r.link,
                r.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// LLM-backed answer writer
pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Draft an answer from corpus chunks, citing papers by mapped number
    pub async fn draft_from_corpus(
        &self,
        query: &str,
        chunks: &[EvidenceChunk],
        history: &str,
        citation_map: &PaperCitationMap,
    ) -> Result<String> {
        let context = corpus_evidence_block(chunks, citation_map);
        let prompt = format!(
            r#"You are an expert research assistant with access to a database of research papers. Answer the user's query using the retrieved context and conversation history.

{history}

Retrieved Context from Database:
{context}

Current Query: {query}

CRITICAL CITATION INSTRUCTIONS:
- Use ONLY numeric citations like [1], [2], [3] etc.
- Do NOT write "Chunk 1" or "according to Chunk" - use ONLY [1], [2] format
- Cite the paper number shown in [Paper N] tags in the context
- Place citations immediately after the relevant statement
- Multiple citations should be [1][2] or [1,2] format
- EVERY factual statement MUST have a citation

CONTENT INSTRUCTIONS:
- Paraphrase and synthesize information in your own words (do NOT copy verbatim)
- Use clear, accessible language while maintaining scientific accuracy
- If the retrieved context fully answers the query, provide a comprehensive response
- If information is incomplete or insufficient, state: "{sentinel}: The retrieved information does not provide complete details about this."
- Consider the conversation history for context
- Be specific about what is covered and what isn't

Example of correct citation format:
"Reduced workload in microgravity is a primary cause of muscle loss [1][3]. This affects lower limb muscles significantly [2]."

Answer with numeric citations [N]:"#,
            history = history,
            context = context,
            query = query,
            sentinel = INSUFFICIENT_SENTINEL,
        );

        info!(chunks = chunks.len(), papers = citation_map.len(), "Drafting answer from corpus");
        self.generator
            .generate(&prompt, &GenerationOptions::text("draft", 0.2, 1500))
            .await
    }

    /// Draft an answer from the full text of the uploaded document
    pub async fn draft_from_document(&self, document_text: &str, query: &str, history: &str) -> Result<String> {
        let prompt = format!(
            r#"You are an expert research assistant analyzing a scientific paper. Answer the query using ONLY the information explicitly stated in the provided paper text.

{history}

Research Paper Excerpt:
{document}

User Query: {query}

CRITICAL INSTRUCTIONS:
- Paraphrase and synthesize information in your own words (do NOT copy verbatim)
- Use clear, accessible language while maintaining scientific accuracy
- If the paper provides information, give a detailed answer
- If information is incomplete or missing, state: "{sentinel}: The paper does not provide complete information about this."
- Be specific about what is and isn't covered

Answer (paraphrased synthesis):"#,
            history = history,
            document = document_text,
            query = query,
            sentinel = INSUFFICIENT_SENTINEL,
        );

        info!(document_chars = document_text.len(), "Drafting answer from uploaded document");
        self.generator
            .generate(&prompt, &GenerationOptions::text("draft", 0.2, 1500))
            .await
    }

    /// Final answer over primary evidence plus external results.
    ///
    /// Primary evidence is cited with plain numbers, external results with
    /// `[External-N]`. The output replaces the draft.
    pub async fn merge(
        &self,
        query: &str,
        primary_evidence: &str,
        external_results: &[ExternalResult],
        history: &str,
        mode: Mode,
    ) -> Result<String> {
        let primary_label = match mode {
            Mode::Corpus => "Database Papers, cited by the number in their [Paper N] tag",
            Mode::Document => "Uploaded Paper",
        };
        let primary = if primary_evidence.trim().is_empty() {
            NO_PRIMARY_EVIDENCE
        } else {
            primary_evidence
        };
        let external = external_evidence_block(external_results);

        let prompt = format!(
            r#"You are an expert research assistant synthesizing information from multiple sources.

{history}

Primary Source ({primary_label}):
{primary}

External Sources:
{external}

Current Query: {query}

CITATION RULES:
- Cite primary source information with numeric citations only: [1], [2], [3]
- Cite external sources ONLY as [External-N], where N is the number of the [External Source N] block
- Never mix the two styles inside one bracket and never invent other labels
- DO NOT write "Chunk", "Database Chunk" or "[Paper]"
- Cite after EVERY claim
- Paraphrase all information
- Provide comprehensive, well-structured answer

Synthesized Answer with Citations:"#,
            history = history,
            primary_label = primary_label,
            primary = primary,
            external = external,
            query = query,
        );

        info!(mode = %mode, external = external_results.len(), "Merging primary and external evidence");
        self.generator
            .generate(&prompt, &GenerationOptions::text("merge", 0.3, 2048))
            .await
    }

    /// Rewrite a query for a scholarly search engine; empty output keeps the query
    pub async fn optimize_search_query(&self, query: &str, history: &str) -> Result<String> {
        let prompt = format!(
            r#"Given the conversation history and current query, generate an optimized search query for Google Scholar.

{history}

Current Query: {query}

Respond with ONLY the search query, no explanations.

Optimized Query:"#,
            history = history,
            query = query,
        );

        let output = self
            .generator
            .generate(&prompt, &GenerationOptions::text("optimize_query", 0.1, 100))
            .await?;

        let optimized = output.trim();
        if optimized.is_empty() {
            return Ok(query.to_string());
        }
        debug!(original = %query, optimized = %optimized, "Search query optimized");
        Ok(optimized.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;
    use serde_json::json;

    fn chunk(id: &str, title: &str, text: &str) -> EvidenceChunk {
        EvidenceChunk {
            id: id.to_string(),
            text: text.to_string(),
            relevance_score: 0.9,
            source_metadata: json!({ "title": title }).as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_blocks_use_paper_numbers() {
        let chunks = vec![
            chunk("1", "A", "first A"),
            chunk("2", "B", "only B"),
            chunk("3", "A", "second A"),
        ];
        let map = PaperCitationMap::build(&chunks);
        let block = corpus_evidence_block(&chunks, &map);
        assert_eq!(
            block,
            "[Paper 1]\nfirst A\n\n---\n\n[Paper 2]\nonly B\n\n---\n\n[Paper 1]\nsecond A"
        );
    }

    #[test]
    fn test_external_block_numbering() {
        let results = vec![
            ExternalResult::general("T1", "https://a", "S1"),
            ExternalResult::general("T2", "https://b", "S2"),
        ];
        let block = external_evidence_block(&results);
        assert!(block.starts_with("[External Source 1]\nTitle: T1\nLink: https://a\nContent: S1"));
        assert!(block.contains("[External Source 2]"));
    }

    #[tokio::test]
    async fn test_draft_prompt_contents() {
        let generator = Arc::new(ScriptedGenerator::new().reply("draft", "Atrophy follows unloading [1]."));
        let synthesizer = AnswerSynthesizer::new(generator.clone());
        let chunks = vec![chunk("1", "A", "unloading evidence")];
        let map = PaperCitationMap::build(&chunks);

        let answer = synthesizer
            .draft_from_corpus("why atrophy?", &chunks, "No previous conversation.", &map)
            .await
            .unwrap();

        assert_eq!(answer, "Atrophy follows unloading [1].");
        let prompt = &generator.prompts("draft")[0];
        assert!(prompt.contains("[Paper 1]\nunloading evidence"));
        assert!(prompt.contains("Current Query: why atrophy?"));
        assert!(prompt.contains("INSUFFICIENT:"));
    }

    #[tokio::test]
    async fn test_merge_without_primary() {
        let generator = Arc::new(ScriptedGenerator::new());
        let synthesizer = AnswerSynthesizer::new(generator.clone());
        let results = vec![ExternalResult::general("T", "https://a", "S")];

        synthesizer
            .merge("q", "", &results, "No previous conversation.", Mode::Corpus)
            .await
            .unwrap();

        let prompt = &generator.prompts("merge")[0];
        assert!(prompt.contains(NO_PRIMARY_EVIDENCE));
        assert!(prompt.contains("[External Source 1]"));
        assert!(prompt.contains("[External-N]"));
    }

    #[tokio::test]
    async fn test_optimize_falls_back_on_empty() {
        let generator = Arc::new(ScriptedGenerator::new().reply("optimize_query", "\n"));
        let synthesizer = AnswerSynthesizer::new(generator);

        let optimized = synthesizer.optimize_search_query("bone loss", "").await.unwrap();
        assert_eq!(optimized, "bone loss");
    }
}
