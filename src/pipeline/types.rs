//! Core data types and error definitions for the analysis pipeline.

use crate::completion::CompletionClientError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Assessment and improvement advice for one rubric category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInsight {
    /// What the reviewer observed in this category.
    pub assessment: String,
    /// Concrete advice for strengthening this category.
    pub improvement_suggestion: String,
}

/// Structured competency report keyed by rubric category.
///
/// A `BTreeMap` keeps serialization deterministic, so a report round-trips
/// byte-identically through the persisted blob representation.
pub type AnalysisReport = BTreeMap<String, CategoryInsight>;

/// Rubric categories requested from the completion service in the reduce phase.
pub const REPORT_CATEGORIES: [&str; 5] =
    ["experience", "skills", "education", "readability", "overall"];

/// Errors produced while splitting extracted text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Caller configured an impossible chunk bound.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Errors emitted by the map-reduce analyzer.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Extracted text was empty; no completion call was made.
    #[error("document contains no analyzable text")]
    EmptyInput,
    /// Chunking step failed to segment the document.
    #[error("failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// A map-phase summarization call failed terminally.
    #[error("summarization of chunk {chunk_index} failed: {source}")]
    PartialSummary {
        /// Zero-based index of the chunk whose call failed.
        chunk_index: usize,
        /// Terminal completion error for that chunk.
        #[source]
        source: CompletionClientError,
    },
    /// The reduce-phase completion call failed terminally.
    #[error("final analysis request failed: {0}")]
    Aggregation(#[from] CompletionClientError),
    /// The reduce-phase response did not parse as a report.
    ///
    /// Carries the raw response text for diagnostics; it is never coerced
    /// into an empty or default report.
    #[error("completion response is not a valid analysis report: {source}")]
    ReportParse {
        /// Raw text returned by the completion service.
        raw: String,
        /// Parser diagnostic.
        #[source]
        source: serde_json::Error,
    },
}

/// Summary of a completed analysis produced by the map-reduce pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// Parsed competency report.
    pub report: AnalysisReport,
    /// Number of chunks summarized in the map phase.
    pub chunk_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_round_trips_through_its_persisted_form() {
        let mut report = AnalysisReport::new();
        for category in REPORT_CATEGORIES {
            report.insert(
                category.to_string(),
                CategoryInsight {
                    assessment: format!("{category} looks solid"),
                    improvement_suggestion: format!("sharpen the {category} section"),
                },
            );
        }

        let encoded = serde_json::to_vec(&report).expect("encode");
        let decoded: AnalysisReport = serde_json::from_slice(&encoded).expect("decode");
        assert_eq!(decoded, report);
    }

    #[test]
    fn insight_requires_both_fields() {
        let error = serde_json::from_str::<CategoryInsight>(r#"{"assessment": "fine"}"#)
            .expect_err("missing field");
        assert!(error.to_string().contains("improvement_suggestion"));
    }
}
