//! Map-reduce analysis pipeline: chunking, per-chunk summarization, and the
//! aggregated structured report.

mod chunking;
mod prompts;
mod service;
/// Report shapes and pipeline error definitions.
pub mod types;

pub use prompts::effective_target_role;
pub use service::{AnalyzerOptions, MapReduceAnalyzer};
pub use types::{
    AnalysisError, AnalysisOutcome, AnalysisReport, CategoryInsight, ChunkingError,
    REPORT_CATEGORIES,
};
