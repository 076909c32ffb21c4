//! HTTP surface for SkillScope.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /analyses` – Upload a document (multipart) and run the full analysis
//!   pipeline: extraction, map-reduce summarization, and persistence.
//! - `POST /analyses/text` – Analyze raw text submitted without a file.
//! - `GET /analyses?owner_id=` – List the owner's analysis history, newest first.
//! - `GET /analyses/:analysis_id?owner_id=` – Fetch one stored report.
//! - `DELETE /analyses/:analysis_id?owner_id=` – Delete an analysis and its blobs.
//! - `GET /metrics` – Observe analysis counters.
//!
//! Owner identity arrives as an explicit parameter; session management lives in an
//! upstream layer and is out of scope here.

use crate::pipeline::{AnalysisError, AnalysisReport};
use crate::service::{AnalysisApi, CompletedAnalysis, ServiceError};
use crate::store::types::PersistError;
use crate::store::{AnalysisSummary, OriginalDocument};
use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Build the HTTP router exposing the analysis API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: AnalysisApi + 'static,
{
    Router::new()
        .route(
            "/analyses",
            post(analyze_document::<S>).get(list_analyses::<S>),
        )
        .route("/analyses/text", post(analyze_text::<S>))
        .route(
            "/analyses/:analysis_id",
            get(open_analysis::<S>).delete(delete_analysis::<S>),
        )
        .route("/metrics", get(get_metrics::<S>))
        .with_state(service)
}

/// Success response for both analysis submission endpoints.
#[derive(Serialize)]
struct AnalyzeResponse {
    /// Identifier assigned to the persisted analysis.
    analysis_id: String,
    /// Creation time in seconds since the epoch.
    created_at: i64,
    /// Uploaded file name, or the direct-input marker.
    original_file_name: String,
    /// Role the analysis was targeted at.
    target_role: String,
    /// Structured competency report.
    report: AnalysisReport,
}

impl From<CompletedAnalysis> for AnalyzeResponse {
    fn from(completed: CompletedAnalysis) -> Self {
        Self {
            analysis_id: completed.record.analysis_id,
            created_at: completed.record.created_at,
            original_file_name: completed.record.original_file_name,
            target_role: completed.record.target_role,
            report: completed.report,
        }
    }
}

/// Upload a document and run the full analysis pipeline.
///
/// Expects multipart fields `file` (the document), `owner_id`, and optionally
/// `target_role`. The declared content type of the `file` part selects the
/// extraction strategy.
async fn analyze_document<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError>
where
    S: AnalysisApi,
{
    let mut owner_id: Option<String> = None;
    let mut target_role = String::new();
    let mut document: Option<OriginalDocument> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| AppError::BadRequest(format!("failed to read multipart field: {error}")))?
    {
        match field.name().unwrap_or_default() {
            "owner_id" => {
                owner_id = Some(field.text().await.map_err(|error| {
                    AppError::BadRequest(format!("failed to read owner_id: {error}"))
                })?);
            }
            "target_role" => {
                target_role = field.text().await.map_err(|error| {
                    AppError::BadRequest(format!("failed to read target_role: {error}"))
                })?;
            }
            "file" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "document".to_string());
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|error| {
                        AppError::BadRequest(format!("failed to read file contents: {error}"))
                    })?
                    .to_vec();
                document = Some(OriginalDocument {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    let owner_id =
        owner_id.ok_or_else(|| AppError::BadRequest("missing owner_id field".into()))?;
    let document = document.ok_or_else(|| AppError::BadRequest("missing file field".into()))?;

    let completed = service
        .analyze_document(&owner_id, document, &target_role)
        .await?;
    Ok(Json(AnalyzeResponse::from(completed)))
}

/// Request body for the `POST /analyses/text` endpoint.
#[derive(Deserialize)]
struct AnalyzeTextRequest {
    /// Identity submitting the text.
    owner_id: String,
    /// Raw text to analyze.
    text: String,
    /// Optional target-role label; blank falls back to the default.
    #[serde(default)]
    target_role: String,
}

/// Analyze raw text submitted without a file.
async fn analyze_text<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<AnalyzeTextRequest>,
) -> Result<Json<AnalyzeResponse>, AppError>
where
    S: AnalysisApi,
{
    let completed = service
        .analyze_text(&request.owner_id, request.text, &request.target_role)
        .await?;
    Ok(Json(AnalyzeResponse::from(completed)))
}

/// Query parameters identifying the requesting owner.
#[derive(Deserialize)]
struct OwnerQuery {
    owner_id: String,
}

/// Response body for `GET /analyses`.
#[derive(Serialize)]
struct ListResponse {
    analyses: Vec<AnalysisSummary>,
}

/// List the owner's analysis history, newest first.
async fn list_analyses<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<ListResponse>, AppError>
where
    S: AnalysisApi,
{
    let analyses = service.list_analyses(&query.owner_id).await?;
    Ok(Json(ListResponse { analyses }))
}

/// Fetch one stored report by analysis id.
async fn open_analysis<S>(
    State(service): State<Arc<S>>,
    Path(analysis_id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<AnalysisReport>, AppError>
where
    S: AnalysisApi,
{
    let report = service.open_analysis(&query.owner_id, &analysis_id).await?;
    Ok(Json(report))
}

/// Delete an analysis, its blobs included.
async fn delete_analysis<S>(
    State(service): State<Arc<S>>,
    Path(analysis_id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<StatusCode, AppError>
where
    S: AnalysisApi,
{
    service
        .delete_analysis(&query.owner_id, &analysis_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Return a concise metrics snapshot with analysis counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsResponse>
where
    S: AnalysisApi,
{
    let snapshot = service.metrics_snapshot();
    Json(MetricsResponse {
        analyses_completed: snapshot.analyses_completed,
        chunks_summarized: snapshot.chunks_summarized,
    })
}

/// Response body for `GET /metrics`.
#[derive(Serialize)]
struct MetricsResponse {
    analyses_completed: u64,
    chunks_summarized: u64,
}

enum AppError {
    BadRequest(String),
    Service(ServiceError),
}

impl From<ServiceError> for AppError {
    fn from(inner: ServiceError) -> Self {
        Self::Service(inner)
    }
}

/// Map service failures to response statuses: caller mistakes are 400, missing
/// records or blobs are 404, upstream completion-service failures are 502, and
/// everything else is 500.
fn status_for(error: &ServiceError) -> StatusCode {
    match error {
        ServiceError::Extract(_) => StatusCode::BAD_REQUEST,
        ServiceError::Analysis(AnalysisError::EmptyInput | AnalysisError::Chunking(_)) => {
            StatusCode::BAD_REQUEST
        }
        ServiceError::Analysis(
            AnalysisError::PartialSummary { .. } | AnalysisError::Aggregation(_),
        ) => StatusCode::BAD_GATEWAY,
        ServiceError::Analysis(AnalysisError::ReportParse { .. }) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ServiceError::Persist(
            PersistError::RecordNotFound { .. }
            | PersistError::ResultUnavailable
            | PersistError::BlobMissing { .. },
        ) => StatusCode::NOT_FOUND,
        ServiceError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::Service(error) => {
                let status = status_for(&error);
                if status.is_server_error() {
                    tracing::error!(error = %error, "Request failed");
                }
                (status, error.to_string()).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsSnapshot;
    use crate::pipeline::CategoryInsight;
    use crate::store::types::{NO_ORIGINAL_BLOB, NO_ORIGINAL_FILE, result_blob_path};
    use crate::store::AnalysisRecord;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    fn sample_report() -> AnalysisReport {
        let mut report = AnalysisReport::new();
        report.insert(
            "experience".into(),
            CategoryInsight {
                assessment: "Clear history.".into(),
                improvement_suggestion: "Add numbers.".into(),
            },
        );
        report
    }

    fn sample_completed(owner_id: &str, file_name: Option<&str>) -> CompletedAnalysis {
        CompletedAnalysis {
            record: AnalysisRecord {
                owner_id: owner_id.into(),
                analysis_id: "a1".into(),
                created_at: 1_700_000_000,
                original_file_name: file_name.unwrap_or(NO_ORIGINAL_FILE).into(),
                target_role: "backend engineer".into(),
                original_blob_path: NO_ORIGINAL_BLOB.into(),
                result_blob_path: result_blob_path(owner_id, "a1"),
            },
            report: sample_report(),
        }
    }

    #[derive(Clone, Debug)]
    struct DocumentCall {
        owner_id: String,
        file_name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
        target_role: String,
    }

    #[derive(Clone, Default)]
    struct StubAnalysisService {
        document_calls: Arc<Mutex<Vec<DocumentCall>>>,
        text_calls: Arc<Mutex<Vec<(String, String, String)>>>,
        deleted: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl AnalysisApi for StubAnalysisService {
        async fn analyze_document(
            &self,
            owner_id: &str,
            document: OriginalDocument,
            target_role: &str,
        ) -> Result<CompletedAnalysis, ServiceError> {
            self.document_calls.lock().await.push(DocumentCall {
                owner_id: owner_id.into(),
                file_name: document.file_name.clone(),
                content_type: document.content_type.clone(),
                bytes: document.bytes.clone(),
                target_role: target_role.into(),
            });
            Ok(sample_completed(owner_id, Some(&document.file_name)))
        }

        async fn analyze_text(
            &self,
            owner_id: &str,
            text: String,
            target_role: &str,
        ) -> Result<CompletedAnalysis, ServiceError> {
            self.text_calls
                .lock()
                .await
                .push((owner_id.into(), text, target_role.into()));
            Ok(sample_completed(owner_id, None))
        }

        async fn list_analyses(
            &self,
            owner_id: &str,
        ) -> Result<Vec<AnalysisSummary>, ServiceError> {
            Ok(vec![AnalysisSummary::from(
                sample_completed(owner_id, None).record,
            )])
        }

        async fn open_analysis(
            &self,
            _owner_id: &str,
            analysis_id: &str,
        ) -> Result<AnalysisReport, ServiceError> {
            if analysis_id == "a1" {
                Ok(sample_report())
            } else {
                Err(PersistError::RecordNotFound {
                    analysis_id: analysis_id.into(),
                }
                .into())
            }
        }

        async fn delete_analysis(
            &self,
            owner_id: &str,
            analysis_id: &str,
        ) -> Result<(), ServiceError> {
            self.deleted
                .lock()
                .await
                .push((owner_id.into(), analysis_id.into()));
            Ok(())
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                analyses_completed: 3,
                chunks_summarized: 12,
            }
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn text_route_passes_submission_to_the_service() {
        let service = Arc::new(StubAnalysisService::default());
        let app = create_router(service.clone());

        let payload = json!({
            "owner_id": "alice",
            "text": "resume body",
            "target_role": "backend engineer"
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/analyses/text")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["analysis_id"], "a1");
        assert_eq!(json["report"]["experience"]["assessment"], "Clear history.");

        let calls = service.text_calls.lock().await.clone();
        assert_eq!(
            calls,
            vec![(
                "alice".to_string(),
                "resume body".to_string(),
                "backend engineer".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn multipart_route_forwards_file_metadata() {
        let service = Arc::new(StubAnalysisService::default());
        let app = create_router(service.clone());

        let boundary = "skillscope-test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"owner_id\"\r\n\r\n\
             alice\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"target_role\"\r\n\r\n\
             backend engineer\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"resume.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             resume body\r\n\
             --{boundary}--\r\n"
        );
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/analyses")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let calls = service.document_calls.lock().await.clone();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.owner_id, "alice");
        assert_eq!(call.file_name, "resume.txt");
        assert_eq!(call.content_type.as_deref(), Some("text/plain"));
        assert_eq!(call.bytes, b"resume body");
        assert_eq!(call.target_role, "backend engineer");
    }

    #[tokio::test]
    async fn multipart_without_a_file_is_a_bad_request() {
        let app = create_router(Arc::new(StubAnalysisService::default()));

        let boundary = "skillscope-test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"owner_id\"\r\n\r\n\
             alice\r\n\
             --{boundary}--\r\n"
        );
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/analyses")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_route_returns_history_with_display_timestamps() {
        let app = create_router(Arc::new(StubAnalysisService::default()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/analyses?owner_id=alice")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["analyses"][0]["analysis_id"], "a1");
        assert_eq!(json["analyses"][0]["created_at_display"], "2023-11-14 22:13:20");
    }

    #[tokio::test]
    async fn unknown_analysis_maps_to_not_found() {
        let app = create_router(Arc::new(StubAnalysisService::default()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/analyses/missing?owner_id=alice")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_route_reports_no_content() {
        let service = Arc::new(StubAnalysisService::default());
        let app = create_router(service.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/analyses/a1?owner_id=alice")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            service.deleted.lock().await.clone(),
            vec![("alice".to_string(), "a1".to_string())]
        );
    }

    #[tokio::test]
    async fn metrics_route_exposes_counters() {
        let app = create_router(Arc::new(StubAnalysisService::default()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["analyses_completed"], 3);
        assert_eq!(json["chunks_summarized"], 12);
    }

    #[test]
    fn upstream_completion_failures_map_to_bad_gateway() {
        use crate::completion::CompletionClientError;

        let unavailable = ServiceError::Analysis(AnalysisError::Aggregation(
            CompletionClientError::ServiceUnavailable("down".into()),
        ));
        assert_eq!(status_for(&unavailable), StatusCode::BAD_GATEWAY);

        let parse = serde_json::from_str::<AnalysisReport>("nope").expect_err("parse error");
        let report = ServiceError::Analysis(AnalysisError::ReportParse {
            raw: "nope".into(),
            source: parse,
        });
        assert_eq!(status_for(&report), StatusCode::INTERNAL_SERVER_ERROR);

        let empty = ServiceError::Analysis(AnalysisError::EmptyInput);
        assert_eq!(status_for(&empty), StatusCode::BAD_REQUEST);
    }
}
