//! Coordinates blob storage and the metadata index for one analysis lifecycle.
//!
//! The two stores share no transaction. Saves write blobs first and the metadata
//! record last, so an interrupted save can only leave an orphaned blob, never an
//! index entry pointing at bytes that were never written. Deletes run the other
//! way around in spirit: blob deletions are best-effort, and only the metadata
//! deletion decides the outcome, because a phantom history entry is worse than a
//! stranded blob.

use crate::pipeline::AnalysisReport;
use crate::store::blob::{BlobStore, HttpBlobStore};
use crate::store::index::{HttpRecordIndex, RecordIndex};
use crate::store::types::{
    AnalysisRecord, AnalysisSummary, NO_ORIGINAL_BLOB, NO_ORIGINAL_FILE, PersistError, SaveStage,
    StoreError, original_blob_path, result_blob_path,
};
use time::OffsetDateTime;
use uuid::Uuid;

/// Accepted copy of an uploaded document, persisted alongside its analysis.
#[derive(Debug, Clone)]
pub struct OriginalDocument {
    /// File name the caller uploaded under.
    pub file_name: String,
    /// Declared media type, forwarded to the blob store.
    pub content_type: Option<String>,
    /// Raw document bytes.
    pub bytes: Vec<u8>,
}

/// Dual-store persistence for analysis results and their history.
pub struct PersistenceCoordinator {
    blobs: Box<dyn BlobStore>,
    index: Box<dyn RecordIndex>,
}

impl PersistenceCoordinator {
    /// Build a coordinator over explicit store implementations.
    pub fn new(blobs: Box<dyn BlobStore>, index: Box<dyn RecordIndex>) -> Self {
        Self { blobs, index }
    }

    /// Build a coordinator over the HTTP stores described by the environment.
    pub fn from_config() -> Result<Self, StoreError> {
        Ok(Self::new(
            Box::new(HttpBlobStore::from_config()?),
            Box::new(HttpRecordIndex::from_config()?),
        ))
    }

    /// Persist a finished analysis: blobs first, metadata record last.
    ///
    /// A text-only submission (no original document) stores explicit sentinels in
    /// the record instead of paths. Any store failure aborts the save and reports
    /// the stage it died in; nothing past that stage was written.
    pub async fn save(
        &self,
        owner_id: &str,
        original: Option<OriginalDocument>,
        report: &AnalysisReport,
        target_role: &str,
    ) -> Result<AnalysisRecord, PersistError> {
        let analysis_id = Uuid::new_v4().to_string();
        let created_at = OffsetDateTime::now_utc().unix_timestamp();

        let (original_file_name, original_path) = match original {
            Some(document) => {
                let path = original_blob_path(owner_id, &analysis_id, &document.file_name);
                self.blobs
                    .put(&path, document.bytes, document.content_type.as_deref())
                    .await
                    .map_err(|source| PersistError::SaveFailed {
                        stage: SaveStage::OriginalBlob,
                        source,
                    })?;
                tracing::info!(owner_id, analysis_id = %analysis_id, path = %path, "Stored original document");
                (document.file_name, path)
            }
            None => {
                tracing::info!(owner_id, analysis_id = %analysis_id, "No original document uploaded");
                (NO_ORIGINAL_FILE.to_string(), NO_ORIGINAL_BLOB.to_string())
            }
        };

        let result_path = result_blob_path(owner_id, &analysis_id);
        let encoded = serde_json::to_vec(report)?;
        self.blobs
            .put(&result_path, encoded, Some("application/json"))
            .await
            .map_err(|source| PersistError::SaveFailed {
                stage: SaveStage::ResultBlob,
                source,
            })?;
        tracing::info!(owner_id, analysis_id = %analysis_id, path = %result_path, "Stored analysis report");

        let record = AnalysisRecord {
            owner_id: owner_id.to_string(),
            analysis_id: analysis_id.clone(),
            created_at,
            original_file_name,
            target_role: target_role.to_string(),
            original_blob_path: original_path,
            result_blob_path: result_path,
        };

        self.index
            .put_record(&record)
            .await
            .map_err(|source| PersistError::SaveFailed {
                stage: SaveStage::Metadata,
                source,
            })?;
        tracing::info!(owner_id, analysis_id = %analysis_id, "Analysis metadata recorded");

        Ok(record)
    }

    /// List the owner's analyses, newest first.
    ///
    /// An owner with no history gets an empty list; only a transport failure is
    /// an error.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<AnalysisSummary>, PersistError> {
        let records = self
            .index
            .query_by_owner(owner_id, true)
            .await
            .map_err(|source| PersistError::Query {
                owner_id: owner_id.to_string(),
                source,
            })?;
        tracing::debug!(owner_id, count = records.len(), "Listed analysis history");
        Ok(records.into_iter().map(AnalysisSummary::from).collect())
    }

    /// Fetch and decode the report blob referenced by a record.
    pub async fn fetch_report(&self, path: &str) -> Result<AnalysisReport, PersistError> {
        if path.trim().is_empty() || path == NO_ORIGINAL_BLOB {
            return Err(PersistError::ResultUnavailable);
        }

        let bytes = match self.blobs.get(path).await {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound { path }) => return Err(PersistError::BlobMissing { path }),
            Err(source) => {
                return Err(PersistError::Fetch {
                    path: path.to_string(),
                    source,
                });
            }
        };

        serde_json::from_slice(&bytes).map_err(|source| PersistError::DecodeReport {
            path: path.to_string(),
            source,
        })
    }

    /// Delete one analysis: both blobs best-effort, then the metadata record.
    ///
    /// The index is keyed by (owner, timestamp), so the record is located by
    /// scanning the owner's partition for the analysis id. Zero matches fail with
    /// a not-found error; more than one match is a defensive failure that id
    /// uniqueness should make impossible.
    pub async fn delete_by_analysis_id(
        &self,
        owner_id: &str,
        analysis_id: &str,
    ) -> Result<(), PersistError> {
        let records = self
            .index
            .query_by_owner(owner_id, true)
            .await
            .map_err(|source| PersistError::Query {
                owner_id: owner_id.to_string(),
                source,
            })?;

        let mut matches = records
            .into_iter()
            .filter(|record| record.analysis_id == analysis_id);
        let record = match (matches.next(), matches.next()) {
            (Some(record), None) => record,
            (Some(_), Some(_)) => {
                return Err(PersistError::AmbiguousRecord {
                    analysis_id: analysis_id.to_string(),
                });
            }
            (None, _) => {
                return Err(PersistError::RecordNotFound {
                    analysis_id: analysis_id.to_string(),
                });
            }
        };

        if record.original_blob_path != NO_ORIGINAL_BLOB {
            if let Err(error) = self.blobs.delete(&record.original_blob_path).await {
                tracing::warn!(
                    path = %record.original_blob_path,
                    error = %error,
                    "Failed to delete original blob; continuing"
                );
            }
        }
        if let Err(error) = self.blobs.delete(&record.result_blob_path).await {
            tracing::warn!(
                path = %record.result_blob_path,
                error = %error,
                "Failed to delete report blob; continuing"
            );
        }

        self.index
            .delete_record(owner_id, record.created_at)
            .await
            .map_err(|source| PersistError::DeleteFailed {
                analysis_id: analysis_id.to_string(),
                source,
            })?;
        tracing::info!(owner_id, analysis_id, "Analysis deleted");
        Ok(())
    }
}
