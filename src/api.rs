//! HTTP surface for the ingestion service.
//!
//! - `POST /api/v1/ingest/upload` – Multipart upload (`file` field) owned by the `X-User-ID`
//!   caller. Responds `202` with `{ "task_id", "message" }` once the job is queued.
//! - `GET /api/v1/ingest/status/:task_id` – Poll a job: `{ status, step, progress, error }`.
//! - `GET /api/v1/documents` – The caller's document records, newest first.
//! - `POST /api/v1/search` – JSON `{ query, limit? }`; nearest chunks owned by the caller.
//! - `GET /health` – Liveness probe.
//! - `GET /metrics` – Ingestion counters.

use crate::documents::{DocumentRecord, RepositoryError};
use crate::jobs::{JobStatusView, QueueError};
use crate::pipeline::IngestionError;
use crate::qdrant::SearchHit;
use crate::service::{DEFAULT_SEARCH_LIMIT, IngestionApi, MAX_SEARCH_LIMIT, UploadError};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Header carrying the authenticated caller's identifier.
pub const OWNER_HEADER: &str = "x-user-id";

/// Build the HTTP router exposing the ingestion API surface.
pub fn create_router<S>(service: Arc<S>, max_upload_bytes: usize) -> Router
where
    S: IngestionApi + 'static,
{
    Router::new()
        .route("/api/v1/ingest/upload", post(upload_document::<S>))
        .route("/api/v1/ingest/status/:task_id", get(get_job_status::<S>))
        .route("/api/v1/documents", get(list_documents::<S>))
        .route("/api/v1/search", post(search_chunks::<S>))
        .route("/health", get(health::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(service)
}

/// Response body for an accepted upload.
#[derive(Serialize)]
struct UploadResponse {
    task_id: Uuid,
    message: &'static str,
}

/// Accept a multipart upload and queue it for ingestion.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError>
where
    S: IngestionApi,
{
    let owner_id = owner_from_headers(&headers)?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(err.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("Uploaded file has no filename".into()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::BadRequest(err.body_text()))?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) =
        upload.ok_or_else(|| AppError::BadRequest("Missing multipart field 'file'".into()))?;
    let task_id = service
        .submit_upload(&owner_id, &filename, bytes.to_vec())
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            task_id,
            message: "Document accepted for processing",
        }),
    ))
}

/// Report the status of a queued or finished job.
async fn get_job_status<S>(
    State(service): State<Arc<S>>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<JobStatusView>, AppError>
where
    S: IngestionApi,
{
    service
        .job_status(task_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Unknown task id {task_id}")))
}

/// Response body for `GET /api/v1/documents`.
#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<DocumentRecord>,
}

/// List the caller's document records.
async fn list_documents<S>(
    State(service): State<Arc<S>>,
    headers: HeaderMap,
) -> Result<Json<DocumentsResponse>, AppError>
where
    S: IngestionApi,
{
    let owner_id = owner_from_headers(&headers)?;
    let documents = service.list_documents(&owner_id).await?;
    Ok(Json(DocumentsResponse { documents }))
}

/// Request body for `POST /api/v1/search`.
#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

/// Nearest chunks to the query, restricted to the caller's documents.
async fn search_chunks<S>(
    State(service): State<Arc<S>>,
    headers: HeaderMap,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError>
where
    S: IngestionApi,
{
    let owner_id = owner_from_headers(&headers)?;
    if request.query.trim().is_empty() {
        return Err(AppError::BadRequest("Search query must not be empty".into()));
    }
    let limit = request
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);
    let results = service.search(&owner_id, &request.query, limit).await?;
    Ok(Json(SearchResponse { results }))
}

async fn health<S>(State(service): State<Arc<S>>) -> Json<serde_json::Value>
where
    S: IngestionApi,
{
    Json(json!({ "status": "ok", "service": service.service_name() }))
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: IngestionApi,
{
    Json(service.metrics_snapshot())
}

fn owner_from_headers(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(OWNER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(AppError::Unauthorized)
}

enum AppError {
    Unauthorized,
    BadRequest(String),
    NotFound(String),
    Upload(UploadError),
    Repository(RepositoryError),
    Search(IngestionError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Missing X-User-ID header".to_string(),
            ),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Upload(error) => {
                let status = match &error {
                    UploadError::Sniff(_) | UploadError::Unsupported(_) => StatusCode::BAD_REQUEST,
                    UploadError::Queue(QueueError::Full | QueueError::Closed) => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    UploadError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!(error = %error, "Upload failed");
                }
                (status, error.to_string())
            }
            Self::Repository(error) => {
                tracing::error!(error = %error, "Document listing failed");
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
            Self::Search(error) => {
                let status = match &error {
                    IngestionError::EmbeddingProvider(_) => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                tracing::error!(error = %error, "Search failed");
                (status, error.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<UploadError> for AppError {
    fn from(inner: UploadError) -> Self {
        Self::Upload(inner)
    }
}

impl From<RepositoryError> for AppError {
    fn from(inner: RepositoryError) -> Self {
        Self::Repository(inner)
    }
}

impl From<IngestionError> for AppError {
    fn from(inner: IngestionError) -> Self {
        Self::Search(inner)
    }
}
