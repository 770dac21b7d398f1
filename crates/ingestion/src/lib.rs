//! Quro document intake
//!
//! Turns an uploaded paper into its full text and numbered reference table.
//!
//! Provides:
//! - `FileExtractor`: the `DocumentExtractor` used by the gateway
//! - PDF text extraction via lopdf
//! - Reference parsing (`[N]` labels with URLs or DOIs)

pub mod errors;
mod extractor;
pub mod pdf;
pub mod references;

pub use errors::IngestionError;
pub use extractor::FileExtractor;
pub use references::extract_references;
