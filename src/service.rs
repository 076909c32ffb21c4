//! Application service tying extraction, analysis, and persistence together.
//!
//! The service owns long-lived handles to the map-reduce analyzer, the persistence
//! coordinator, and the metrics registry so the HTTP surface reuses the same
//! components across requests. Construct it once near process start and share it
//! through an `Arc`. Each request runs on its own task; the backing stores are the
//! only shared resources and are externally synchronized.

use crate::extract::{ExtractError, extract_text};
use crate::metrics::{AnalysisMetrics, MetricsSnapshot};
use crate::pipeline::{
    AnalysisError, AnalysisReport, MapReduceAnalyzer, effective_target_role,
};
use crate::store::{
    AnalysisRecord, AnalysisSummary, OriginalDocument, PersistError, PersistenceCoordinator,
    StoreError,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by the analysis service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Document content could not be extracted.
    #[error(transparent)]
    Extract(#[from] ExtractError),
    /// Map-reduce analysis failed.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    /// Persistence layer failed.
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// A finished analysis: the persisted record plus the report it references.
#[derive(Debug, Clone)]
pub struct CompletedAnalysis {
    /// Metadata record written to the index.
    pub record: AnalysisRecord,
    /// Parsed competency report, as persisted in the result blob.
    pub report: AnalysisReport,
}

/// Abstraction over the analysis service used by the HTTP surface.
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// Extract, analyze, and persist an uploaded document.
    async fn analyze_document(
        &self,
        owner_id: &str,
        document: OriginalDocument,
        target_role: &str,
    ) -> Result<CompletedAnalysis, ServiceError>;

    /// Analyze and persist raw text submitted without a file.
    async fn analyze_text(
        &self,
        owner_id: &str,
        text: String,
        target_role: &str,
    ) -> Result<CompletedAnalysis, ServiceError>;

    /// List the owner's analysis history, newest first.
    async fn list_analyses(&self, owner_id: &str) -> Result<Vec<AnalysisSummary>, ServiceError>;

    /// Fetch the stored report for one of the owner's analyses.
    async fn open_analysis(
        &self,
        owner_id: &str,
        analysis_id: &str,
    ) -> Result<AnalysisReport, ServiceError>;

    /// Delete one of the owner's analyses, blobs included.
    async fn delete_analysis(&self, owner_id: &str, analysis_id: &str)
    -> Result<(), ServiceError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Coordinates the full analysis lifecycle: extract, map-reduce, persist, browse.
pub struct AnalysisService {
    analyzer: MapReduceAnalyzer,
    coordinator: PersistenceCoordinator,
    metrics: Arc<AnalysisMetrics>,
}

impl AnalysisService {
    /// Build a service over explicit components.
    pub fn new(analyzer: MapReduceAnalyzer, coordinator: PersistenceCoordinator) -> Self {
        Self {
            analyzer,
            coordinator,
            metrics: Arc::new(AnalysisMetrics::new()),
        }
    }

    /// Build a service from the loaded configuration.
    pub fn from_config() -> Result<Self, StoreError> {
        Ok(Self::new(
            MapReduceAnalyzer::from_config(),
            PersistenceCoordinator::from_config()?,
        ))
    }

    async fn run_and_save(
        &self,
        owner_id: &str,
        original: Option<OriginalDocument>,
        text: &str,
        target_role: &str,
    ) -> Result<CompletedAnalysis, ServiceError> {
        let role = effective_target_role(target_role).to_string();
        let outcome = self.analyzer.analyze(text, &role).await?;
        let record = self
            .coordinator
            .save(owner_id, original, &outcome.report, &role)
            .await?;
        self.metrics.record_analysis(outcome.chunk_count as u64);
        tracing::info!(
            owner_id,
            analysis_id = %record.analysis_id,
            chunks = outcome.chunk_count,
            target_role = %role,
            "Analysis saved"
        );
        Ok(CompletedAnalysis {
            record,
            report: outcome.report,
        })
    }

    /// Locate one of the owner's records by analysis id.
    ///
    /// The index sorts by timestamp, not id, so this scans the owner's partition
    /// the same way deletion does.
    async fn find_record(
        &self,
        owner_id: &str,
        analysis_id: &str,
    ) -> Result<AnalysisSummary, ServiceError> {
        let summaries = self.coordinator.list_by_owner(owner_id).await?;
        let mut matches = summaries
            .into_iter()
            .filter(|summary| summary.analysis_id == analysis_id);
        match (matches.next(), matches.next()) {
            (Some(summary), None) => Ok(summary),
            (Some(_), Some(_)) => Err(PersistError::AmbiguousRecord {
                analysis_id: analysis_id.to_string(),
            }
            .into()),
            (None, _) => Err(PersistError::RecordNotFound {
                analysis_id: analysis_id.to_string(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl AnalysisApi for AnalysisService {
    async fn analyze_document(
        &self,
        owner_id: &str,
        document: OriginalDocument,
        target_role: &str,
    ) -> Result<CompletedAnalysis, ServiceError> {
        tracing::info!(
            owner_id,
            file_name = %document.file_name,
            content_type = ?document.content_type,
            "Analyzing uploaded document"
        );
        let text = extract_text(&document.bytes, document.content_type.as_deref())?;
        self.run_and_save(owner_id, Some(document), &text, target_role)
            .await
    }

    async fn analyze_text(
        &self,
        owner_id: &str,
        text: String,
        target_role: &str,
    ) -> Result<CompletedAnalysis, ServiceError> {
        tracing::info!(owner_id, chars = text.chars().count(), "Analyzing submitted text");
        self.run_and_save(owner_id, None, &text, target_role).await
    }

    async fn list_analyses(&self, owner_id: &str) -> Result<Vec<AnalysisSummary>, ServiceError> {
        Ok(self.coordinator.list_by_owner(owner_id).await?)
    }

    async fn open_analysis(
        &self,
        owner_id: &str,
        analysis_id: &str,
    ) -> Result<AnalysisReport, ServiceError> {
        let summary = self.find_record(owner_id, analysis_id).await?;
        Ok(self
            .coordinator
            .fetch_report(&summary.result_blob_path)
            .await?)
    }

    async fn delete_analysis(
        &self,
        owner_id: &str,
        analysis_id: &str,
    ) -> Result<(), ServiceError> {
        Ok(self
            .coordinator
            .delete_by_analysis_id(owner_id, analysis_id)
            .await?)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
