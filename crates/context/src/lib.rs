//! Quro answer pipeline
//!
//! Routes a query to the paper corpus or an uploaded document, drafts a
//! cited answer, judges its sufficiency and escalates to external search
//! when the evidence falls short.
//!
//! Provides:
//! - `Orchestrator`: per-session mode controller implementing `ResearchAssistant`
//! - Conversation state with bounded history
//! - Query rewriting, evidence retrieval, sufficiency assessment and synthesis

pub mod citation;
pub mod conversation;
pub mod evidence;
pub mod orchestrator;
pub mod rewriter;
pub mod session;
pub mod sufficiency;
pub mod synthesizer;

#[cfg(test)]
mod testing;

pub use citation::{audit_citations, extract_reference_numbers, CitationAudit, PaperCitationMap};
pub use conversation::{ConversationState, ConversationTurn, Role};
pub use evidence::{CorpusEvidence, EvidenceRetriever};
pub use orchestrator::{Orchestrator, PipelinePorts, ResearchAssistant};
pub use session::{LoadedDocument, Session};
pub use sufficiency::{Judgment, JudgmentOutcome, JudgmentParseError};
