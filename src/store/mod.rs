//! Dual-store persistence: blob storage for documents and reports, plus a sorted
//! metadata index for browsing them.

/// Object storage client and trait.
pub mod blob;
mod coordinator;
/// Metadata index client and trait.
pub mod index;
/// Record shapes, path scheme, and persistence errors.
pub mod types;

pub use coordinator::{OriginalDocument, PersistenceCoordinator};
pub use types::{
    AnalysisRecord, AnalysisSummary, NO_ORIGINAL_BLOB, NO_ORIGINAL_FILE, PersistError, SaveStage,
    StoreError,
};
