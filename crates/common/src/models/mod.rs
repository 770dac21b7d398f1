//! Core data model shared by the answer pipeline and its adapters
//!
//! Evidence chunks, document references, external results and the
//! per-query response returned to the transport layer.

mod evidence;
mod reference;
mod response;

pub use evidence::{normalize_year, EvidenceChunk, ExternalResult, ExternalResultKind};
pub use reference::{ReferenceTable, SourceReference};
pub use response::{Mode, QueryResponse, ResolutionMethod, UPLOADED_DOCUMENT_SOURCE};
