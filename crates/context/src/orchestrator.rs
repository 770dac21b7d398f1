//! Mode controller tying the pipeline together
//!
//! One `Orchestrator` owns one session. It rewrites the query, gathers
//! primary evidence for the current mode, drafts and judges an answer and
//! escalates to external search when the evidence falls short.

use crate::citation::{audit_citations, extract_reference_numbers, PaperCitationMap};
use crate::evidence::{CorpusEvidence, EvidenceRetriever};
use crate::rewriter::QueryRewriter;
use crate::session::{LoadedDocument, Session};
use crate::sufficiency::{corpus_escalation, corpus_preview, document_escalation, SufficiencyAssessor};
use crate::synthesizer::{corpus_evidence_block, AnswerSynthesizer};
use async_trait::async_trait;
use quro_common::config::PipelineConfig;
use quro_common::errors::Result;
use quro_common::llm::Generator;
use quro_common::metrics;
use quro_common::models::{ExternalResult, Mode, QueryResponse, ResolutionMethod, UPLOADED_DOCUMENT_SOURCE};
use quro_common::retrieval::{VectorIndex, WebSearcher};
use quro_common::{DocumentExtractor, Embedder};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

/// Answer when neither the corpus nor external search found anything
pub const NO_INFORMATION_ANSWER: &str = "No relevant information found.";

/// Caveat appended to corpus drafts when external search came back empty
pub const LIMITED_INFORMATION_NOTE: &str = "Note: Limited information available in database.";

/// Caveat appended to document drafts when external search came back empty
pub const NO_ADDITIONAL_SOURCES_NOTE: &str = "Note: Could not retrieve additional sources.";

/// Operations the transport layer drives a session through
#[async_trait]
pub trait ResearchAssistant: Send {
    /// Answer a query in the current mode
    async fn ask(&mut self, text: &str) -> Result<QueryResponse>;

    /// Load a document and switch to document mode; `false` leaves the
    /// session untouched
    async fn upload(&mut self, path: &Path) -> bool;

    /// Return to corpus mode
    fn reset(&mut self);

    /// Forget the conversation, keeping the mode
    fn clear_history(&mut self);

    fn mode(&self) -> Mode;
}

/// Backend ports injected by the composition root
#[derive(Clone)]
pub struct PipelinePorts {
    pub generator: Arc<dyn Generator>,
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
    pub searcher: Arc<dyn WebSearcher>,
    pub extractor: Arc<dyn DocumentExtractor>,
}

/// Pipeline for one session
pub struct Orchestrator {
    session: Session,
    rewriter: QueryRewriter,
    retriever: EvidenceRetriever,
    synthesizer: AnswerSynthesizer,
    assessor: SufficiencyAssessor,
    extractor: Arc<dyn DocumentExtractor>,
    config: PipelineConfig,
}

impl Orchestrator {
    /// Create a session in corpus mode
    pub fn new(ports: PipelinePorts, config: PipelineConfig) -> Self {
        Self {
            session: Session::new(config.history_capacity),
            rewriter: QueryRewriter::new(ports.generator.clone()),
            retriever: EvidenceRetriever::new(ports.embedder, ports.index, ports.searcher, config.clone()),
            synthesizer: AnswerSynthesizer::new(ports.generator.clone()),
            assessor: SufficiencyAssessor::new(ports.generator),
            extractor: ports.extractor,
            config,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Answer `query` and record the exchange.
    ///
    /// The turn pair is recorded only once an answer exists, so an error or
    /// a dropped future leaves the conversation as it was.
    #[instrument(skip(self, query), fields(mode = %self.session.mode()))]
    pub async fn answer(&mut self, query: &str) -> Result<QueryResponse> {
        let start = Instant::now();
        let history = self.session.conversation().render(self.config.history_window).to_string();

        let response = match self.session.document() {
            None => self.corpus_flow(query, &history).await,
            Some(document) => self.document_flow(document, query, &history).await,
        }
        .inspect_err(|e| error!(error = %e, "Query failed"))?;

        self.session.record_exchange(query, &response.answer_text);

        let elapsed = start.elapsed().as_secs_f64();
        metrics::record_query(elapsed, response.mode.as_str(), response.resolution_method.as_str());
        info!(
            method = %response.resolution_method,
            sources = response.source_list.len(),
            duration_ms = (elapsed * 1000.0) as u64,
            "Query answered"
        );
        Ok(response)
    }

    /// Extract `path` and enter document mode.
    ///
    /// Returns the number of references found. On error the session keeps
    /// its previous mode, document and conversation.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn load_document(&mut self, path: &Path) -> Result<usize> {
        let extracted = self.extractor.extract(path).await?;
        let references = extracted.references.len();

        self.session
            .load_document(LoadedDocument::new(path.to_path_buf(), extracted));

        info!(references, "Switched to document mode");
        Ok(references)
    }

    async fn corpus_flow(&self, query: &str, history: &str) -> Result<QueryResponse> {
        let expanded = self.rewriter.expand(query, history).await?;
        let evidence = self.retriever.retrieve_corpus(&expanded).await;

        if evidence.is_empty() {
            info!("No corpus evidence, falling back to external search");
            return self.external_only_flow(query, &expanded, history).await;
        }

        let citation_map = PaperCitationMap::build(&evidence.chunks);
        // Drafting uses the user's wording; retrieval used the expansion.
        let draft = self
            .synthesizer
            .draft_from_corpus(query, &evidence.chunks, history, &citation_map)
            .await?;

        let outcome = self
            .assessor
            .assess(query, &corpus_preview(&evidence.chunks), &draft)
            .await?;
        let sources = citation_map.source_list(&evidence.chunks);

        let Some(reason) = corpus_escalation(
            outcome.judgment(),
            evidence.avg_score,
            self.config.insufficient_score_threshold,
        ) else {
            audit_citations(&draft, Some(citation_map.len()), 0);
            return Ok(corpus_response(draft, sources, ResolutionMethod::CorpusOnly, evidence, Vec::new()));
        };

        info!(reason = reason.as_str(), avg_score = evidence.avg_score, "Escalating to external search");
        metrics::record_escalation(Mode::Corpus.as_str(), reason.as_str());

        let search_query = self.synthesizer.optimize_search_query(&expanded, history).await?;
        let external = self
            .retriever
            .search_external(&search_query, self.config.external_results)
            .await;

        if external.is_empty() {
            let answer = format!("{}\n\n{}", draft, LIMITED_INFORMATION_NOTE);
            return Ok(corpus_response(
                answer,
                sources,
                ResolutionMethod::CorpusExternalFailed,
                evidence,
                Vec::new(),
            ));
        }

        // Same [Paper N] evidence and numbering as the draft, so merged
        // numeric citations line up with the source list.
        let primary = corpus_evidence_block(&evidence.chunks, &citation_map);
        let merged = self
            .synthesizer
            .merge(query, &primary, &external, history, Mode::Corpus)
            .await?;
        audit_citations(&merged, Some(citation_map.len()), external.len());

        let mut sources = sources;
        sources.extend(external.iter().map(|r| r.link.clone()));
        Ok(corpus_response(
            merged,
            sources,
            ResolutionMethod::CorpusPlusExternal,
            evidence,
            external,
        ))
    }

    async fn external_only_flow(&self, query: &str, expanded: &str, history: &str) -> Result<QueryResponse> {
        metrics::record_escalation(Mode::Corpus.as_str(), "no_corpus_results");

        let search_query = self.synthesizer.optimize_search_query(expanded, history).await?;
        let external = self
            .retriever
            .search_external(&search_query, self.config.external_results)
            .await;

        if external.is_empty() {
            return Ok(QueryResponse::new(
                NO_INFORMATION_ANSWER,
                Vec::new(),
                ResolutionMethod::NoResults,
                Mode::Corpus,
            ));
        }

        let merged = self
            .synthesizer
            .merge(query, "", &external, history, Mode::Corpus)
            .await?;
        audit_citations(&merged, Some(0), external.len());

        let sources = external.iter().map(|r| r.link.clone()).collect();
        let mut response = QueryResponse::new(merged, sources, ResolutionMethod::ExternalOnly, Mode::Corpus);
        response.external_results = external;
        Ok(response)
    }

    async fn document_flow(&self, document: &LoadedDocument, query: &str, history: &str) -> Result<QueryResponse> {
        let draft = self
            .synthesizer
            .draft_from_document(&document.text, query, history)
            .await?;

        // The judge sees the document itself, not a truncated preview.
        let outcome = self.assessor.assess(query, &document.text, &draft).await?;

        let Some(reason) = document_escalation(outcome.judgment()) else {
            audit_citations(&draft, None, 0);
            return Ok(QueryResponse::new(
                draft,
                vec![UPLOADED_DOCUMENT_SOURCE.to_string()],
                ResolutionMethod::DocumentOnly,
                Mode::Document,
            ));
        };
        metrics::record_escalation(Mode::Document.as_str(), reason.as_str());

        let reference_numbers = extract_reference_numbers(query);
        let mut external: Vec<ExternalResult> = Vec::new();
        if !reference_numbers.is_empty() && !document.references.is_empty() {
            external = self
                .retriever
                .lookup_references(&document.references, &reference_numbers, query)
                .await;
        }
        if external.is_empty() {
            let search_query = self.synthesizer.optimize_search_query(query, history).await?;
            external = self
                .retriever
                .search_external(&search_query, self.config.external_results)
                .await;
        }

        if external.is_empty() {
            let answer = format!("{}\n\n{}", draft, NO_ADDITIONAL_SOURCES_NOTE);
            let mut response = QueryResponse::new(
                answer,
                vec![UPLOADED_DOCUMENT_SOURCE.to_string()],
                ResolutionMethod::DocumentExternalFailed,
                Mode::Document,
            );
            response.reference_numbers_used = reference_numbers;
            return Ok(response);
        }

        let merged = self
            .synthesizer
            .merge(query, &draft, &external, history, Mode::Document)
            .await?;
        audit_citations(&merged, None, external.len());

        let mut sources = vec![UPLOADED_DOCUMENT_SOURCE.to_string()];
        sources.extend(external.iter().map(|r| r.link.clone()));

        let mut response = QueryResponse::new(merged, sources, ResolutionMethod::DocumentPlusExternal, Mode::Document);
        response.external_results = external;
        response.reference_numbers_used = reference_numbers;
        Ok(response)
    }
}

fn corpus_response(
    answer: String,
    sources: Vec<String>,
    method: ResolutionMethod,
    evidence: CorpusEvidence,
    external: Vec<ExternalResult>,
) -> QueryResponse {
    let mut response = QueryResponse::new(answer, sources, method, Mode::Corpus);
    response.avg_relevance_score = evidence.avg_score;
    response.evidence_chunks = evidence.chunks;
    response.external_results = external;
    response
}

#[async_trait]
impl ResearchAssistant for Orchestrator {
    async fn ask(&mut self, text: &str) -> Result<QueryResponse> {
        self.answer(text).await
    }

    async fn upload(&mut self, path: &Path) -> bool {
        match self.load_document(path).await {
            Ok(_) => true,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Document upload failed");
                false
            }
        }
    }

    fn reset(&mut self) {
        info!("Switching back to corpus mode");
        self.session.reset_to_corpus();
    }

    fn clear_history(&mut self) {
        self.session.clear_history();
    }

    fn mode(&self) -> Mode {
        self.session.mode()
    }
}
