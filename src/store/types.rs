//! Record shapes, path scheme, and error definitions for the persistence layer.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

/// Sentinel stored in `original_blob_path` when no original document was uploaded.
///
/// An explicit marker, never an empty string, so display logic cannot mistake
/// omission for data.
pub const NO_ORIGINAL_BLOB: &str = "N/A";

/// Sentinel stored in `original_file_name` for text-only submissions.
pub const NO_ORIGINAL_FILE: &str = "direct text input";

/// Metadata record describing one persisted analysis.
///
/// The index partitions records by `owner_id` and sorts them by `created_at`;
/// `analysis_id` is a plain attribute, which is why deletion by id has to scan
/// the owner's partition first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Identity that owns this analysis.
    pub owner_id: String,
    /// Opaque unique token assigned at save time.
    pub analysis_id: String,
    /// Creation time in integer seconds since the epoch; the index sort key.
    pub created_at: i64,
    /// Name of the uploaded file, or [`NO_ORIGINAL_FILE`].
    pub original_file_name: String,
    /// Role the analysis was targeted at.
    pub target_role: String,
    /// Blob path of the accepted original, or [`NO_ORIGINAL_BLOB`].
    pub original_blob_path: String,
    /// Blob path of the serialized analysis report.
    pub result_blob_path: String,
}

/// List-view projection of an [`AnalysisRecord`].
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    /// Identity that owns this analysis.
    pub owner_id: String,
    /// Opaque unique token assigned at save time.
    pub analysis_id: String,
    /// Creation time in integer seconds since the epoch.
    pub created_at: i64,
    /// Creation time rendered as `YYYY-MM-DD HH:MM:SS` UTC.
    pub created_at_display: String,
    /// Name of the uploaded file, or [`NO_ORIGINAL_FILE`].
    pub original_file_name: String,
    /// Role the analysis was targeted at.
    pub target_role: String,
    /// Blob path of the accepted original, or [`NO_ORIGINAL_BLOB`].
    pub original_blob_path: String,
    /// Blob path of the serialized analysis report.
    pub result_blob_path: String,
}

impl From<AnalysisRecord> for AnalysisSummary {
    fn from(record: AnalysisRecord) -> Self {
        let created_at_display = format_epoch_display(record.created_at);
        Self {
            owner_id: record.owner_id,
            analysis_id: record.analysis_id,
            created_at: record.created_at,
            created_at_display,
            original_file_name: record.original_file_name,
            target_role: record.target_role,
            original_blob_path: record.original_blob_path,
            result_blob_path: record.result_blob_path,
        }
    }
}

/// Render an epoch-seconds timestamp for history listings.
pub(crate) fn format_epoch_display(epoch_seconds: i64) -> String {
    match OffsetDateTime::from_unix_timestamp(epoch_seconds) {
        Ok(moment) => format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            moment.year(),
            u8::from(moment.month()),
            moment.day(),
            moment.hour(),
            moment.minute(),
            moment.second()
        ),
        Err(_) => "unknown".to_string(),
    }
}

/// Blob path for an uploaded original document.
pub(crate) fn original_blob_path(owner_id: &str, analysis_id: &str, file_name: &str) -> String {
    format!("resumes/{owner_id}/{analysis_id}/{file_name}")
}

/// Blob path for a serialized analysis report.
pub(crate) fn result_blob_path(owner_id: &str, analysis_id: &str) -> String {
    format!("analysis-results/{owner_id}/{analysis_id}/result.json")
}

/// Transport-level errors returned by the blob store and metadata index clients.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid store URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Store has no object at the requested path.
    #[error("No object stored at {path}")]
    NotFound {
        /// Path that resolved to nothing.
        path: String,
    },
    /// Store responded with an unexpected status code.
    #[error("Unexpected store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Step of the save state machine that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStage {
    /// Writing the accepted original document blob.
    OriginalBlob,
    /// Writing the serialized report blob.
    ResultBlob,
    /// Writing the metadata record.
    Metadata,
}

impl std::fmt::Display for SaveStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::OriginalBlob => "original blob write",
            Self::ResultBlob => "result blob write",
            Self::Metadata => "metadata write",
        };
        f.write_str(label)
    }
}

/// Errors emitted by the persistence coordinator.
#[derive(Debug, Error)]
pub enum PersistError {
    /// A save aborted at the named stage; nothing after that stage was written.
    #[error("save failed during {stage}: {source}")]
    SaveFailed {
        /// Stage of the save state machine that failed.
        stage: SaveStage,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
    /// Analysis report could not be serialized for storage.
    #[error("failed to encode analysis report: {0}")]
    EncodeReport(#[from] serde_json::Error),
    /// Stored report bytes no longer parse as a report.
    #[error("stored report at {path} is not a valid analysis report: {source}")]
    DecodeReport {
        /// Blob path the undecodable bytes came from.
        path: String,
        /// Parser diagnostic.
        #[source]
        source: serde_json::Error,
    },
    /// Record carries the no-result sentinel; there is nothing to fetch.
    #[error("record lists no stored result")]
    ResultUnavailable,
    /// Record references a result blob the store no longer holds.
    #[error("no stored object at {path}")]
    BlobMissing {
        /// Dangling blob path taken from the record.
        path: String,
    },
    /// Result blob read failed at the transport level.
    #[error("failed to read stored report at {path}: {source}")]
    Fetch {
        /// Blob path that was being read.
        path: String,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
    /// Owner-partition query failed at the transport level.
    #[error("query for owner {owner_id} failed: {source}")]
    Query {
        /// Owner whose partition was being read.
        owner_id: String,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
    /// No record in the owner's partition carries the requested analysis id.
    #[error("no analysis record matches {analysis_id}")]
    RecordNotFound {
        /// Analysis id that matched nothing.
        analysis_id: String,
    },
    /// More than one record carries the requested analysis id.
    #[error("analysis id {analysis_id} matches multiple records")]
    AmbiguousRecord {
        /// Analysis id that matched more than once.
        analysis_id: String,
    },
    /// Metadata record deletion failed; the index entry still exists.
    #[error("failed to delete metadata record for {analysis_id}: {source}")]
    DeleteFailed {
        /// Analysis id whose record could not be removed.
        analysis_id: String,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
}
