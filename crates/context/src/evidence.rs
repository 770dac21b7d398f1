//! Evidence Retriever - Corpus search, web fallback and reference lookup
//!
//! Every path here is soft-failing: embedding, index and search-provider
//! errors (and timeouts) degrade to an empty evidence set instead of
//! failing the query.

use futures::future::join_all;
use quro_common::config::PipelineConfig;
use quro_common::metrics;
use quro_common::models::{EvidenceChunk, ExternalResult, ReferenceTable};
use quro_common::retrieval::{VectorIndex, WebSearcher};
use quro_common::Embedder;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Chunks retrieved from the corpus for one query
#[derive(Debug, Clone, Default)]
pub struct CorpusEvidence {
    /// Chunks ordered by descending score
    pub chunks: Vec<EvidenceChunk>,

    /// Mean similarity, 0.0 when empty
    pub avg_score: f32,
}

impl CorpusEvidence {
    pub fn new(chunks: Vec<EvidenceChunk>) -> Self {
        let avg_score = if chunks.is_empty() {
            0.0
        } else {
            chunks.iter().map(|c| c.relevance_score).sum::<f32>() / chunks.len() as f32
        };
        Self { chunks, avg_score }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Uniform front over the corpus index and the web searcher
pub struct EvidenceRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    searcher: Arc<dyn WebSearcher>,
    config: PipelineConfig,
}

impl EvidenceRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        searcher: Arc<dyn WebSearcher>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            searcher,
            config,
        }
    }

    /// Top-K corpus chunks for `query` above the similarity floor
    pub async fn retrieve_corpus(&self, query: &str) -> CorpusEvidence {
        let start = Instant::now();
        let deadline = self.config.retrieval_timeout();

        let vector = match timeout(deadline, self.embedder.embed(query)).await {
            Ok(Ok(vector)) => vector,
            Ok(Err(e)) => {
                warn!(error = %e, "Query embedding failed, continuing without corpus evidence");
                metrics::record_retrieval(start.elapsed().as_secs_f64(), 0, false);
                return CorpusEvidence::default();
            }
            Err(_) => {
                warn!(timeout_secs = deadline.as_secs(), "Query embedding timed out");
                metrics::record_retrieval(start.elapsed().as_secs_f64(), 0, false);
                return CorpusEvidence::default();
            }
        };

        let search = self.index.search(
            &vector,
            self.config.retrieval_limit,
            self.config.relevance_threshold,
        );
        let hits = match timeout(deadline, search).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                warn!(index = self.index.name(), error = %e, "Vector search failed");
                metrics::record_retrieval(start.elapsed().as_secs_f64(), 0, false);
                return CorpusEvidence::default();
            }
            Err(_) => {
                warn!(index = self.index.name(), "Vector search timed out");
                metrics::record_retrieval(start.elapsed().as_secs_f64(), 0, false);
                return CorpusEvidence::default();
            }
        };

        let evidence = CorpusEvidence::new(hits.into_iter().map(|h| h.into_chunk()).collect());
        metrics::record_retrieval(start.elapsed().as_secs_f64(), evidence.chunks.len(), true);

        info!(
            results = evidence.chunks.len(),
            avg_score = evidence.avg_score,
            "Corpus retrieval complete"
        );
        evidence
    }

    /// General external search; failures yield an empty list
    pub async fn search_external(&self, query: &str, limit: usize) -> Vec<ExternalResult> {
        self.search_soft(query, limit, "general").await
    }

    /// Resolve numbered document references through the web searcher.
    ///
    /// Each requested number present in `table` becomes one top-1 search;
    /// unknown numbers and references with nothing searchable are skipped.
    /// Lookups run concurrently and results keep the requested order.
    pub async fn lookup_references(
        &self,
        table: &ReferenceTable,
        requested_numbers: &[String],
        query: &str,
    ) -> Vec<ExternalResult> {
        let lookups = requested_numbers.iter().filter_map(|number| {
            let Some(reference) = table.get(number) else {
                debug!(reference = %number, "Reference not in document, skipping");
                return None;
            };
            let search_query = reference.lookup_query(query)?;
            Some(async move {
                debug!(reference = %number, search_query = %search_query, "Looking up reference");
                self.search_soft(&search_query, 1, "reference_lookup")
                    .await
                    .into_iter()
                    .next()
                    .map(|result| result.into_reference_lookup(number.clone()))
            })
        });

        let results: Vec<ExternalResult> = join_all(lookups).await.into_iter().flatten().collect();
        info!(
            requested = requested_numbers.len(),
            resolved = results.len(),
            "Reference lookup complete"
        );
        results
    }

    async fn search_soft(&self, query: &str, limit: usize, kind: &str) -> Vec<ExternalResult> {
        let deadline = self.config.retrieval_timeout();
        match timeout(deadline, self.searcher.search(query, limit)).await {
            Ok(Ok(results)) => {
                metrics::record_external_search(kind, true);
                results.into_iter().take(limit).collect()
            }
            Ok(Err(e)) => {
                warn!(kind, error = %e, "External search failed");
                metrics::record_external_search(kind, false);
                Vec::new()
            }
            Err(_) => {
                warn!(kind, timeout_secs = deadline.as_secs(), "External search timed out");
                metrics::record_external_search(kind, false);
                Vec::new()
            }
        }
    }
}
