//! File REST API Routes
//!
//! Uploads arrive as the raw request body. The content type comes from the
//! `Content-Type` header and the client file name from `x-file-name`; only
//! its extension survives into the stored object name.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use sprint_core::{FileId, FileRecord, SprintError, UsageTag, UserId};
use sprint_lifecycle::{SweepReport, UploadRequest};

use crate::constants::{FILE_NAME_HEADER, MAX_UPLOAD_BYTES, USER_ID_HEADER};
use crate::error::ApiResult;
#[cfg(feature = "openapi")]
use {crate::error::ApiError, sprint_lifecycle::DeleteOutcome};
use crate::state::AppState;
use crate::telemetry::METRICS;

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/files - Upload a file
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/v1/files",
    tag = "Files",
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    params(
        ("x-file-name" = Option<String>, Header, description = "Client-side file name"),
        ("x-user-id" = Option<String>, Header, description = "Uploading user id"),
    ),
    responses(
        (status = 201, description = "File stored as Temporary", body = FileRecord),
        (status = 400, description = "Missing content type, empty body or bad user id", body = ApiError),
        (status = 503, description = "Object storage or store unavailable", body = ApiError),
    ),
))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let owner = header_str(&headers, USER_ID_HEADER)
        .map(|raw| UserId::parse(&raw))
        .transpose()
        .map_err(SprintError::from)?;

    let request = UploadRequest {
        file_name: header_str(&headers, FILE_NAME_HEADER).unwrap_or_default(),
        content_type: header_str(&headers, header::CONTENT_TYPE.as_str()).unwrap_or_default(),
        bytes: body.to_vec(),
        owner,
    };

    let record = state.services.files.upload(request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/v1/files/{id} - Get a file record
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/v1/files/{id}",
    tag = "Files",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "File record", body = FileRecord),
        (status = 400, description = "Malformed id", body = ApiError),
        (status = 404, description = "File not found", body = ApiError),
    ),
))]
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<FileRecord>> {
    let id = FileId::parse(&id).map_err(SprintError::from)?;
    let record = state.services.files.get_file(id).await?;
    Ok(Json(record))
}

/// DELETE /api/v1/files/{id} - Delete a file and its stored object
///
/// Returns 207 when the record is gone but the object could not be removed.
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/api/v1/files/{id}",
    tag = "Files",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "File deleted", body = DeleteOutcome),
        (status = 207, description = "Record deleted, object delete failed", body = DeleteOutcome),
        (status = 400, description = "Malformed id", body = ApiError),
        (status = 404, description = "File not found", body = ApiError),
    ),
))]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.services.files.delete(&id).await?;
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(outcome)))
}

/// GET /api/v1/files/usage/{tag} - List live files with a usage tag
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/v1/files/usage/{tag}",
    tag = "Files",
    params(("tag" = String, Path, description = "Usage tag, e.g. Gallery or RuleBook")),
    responses(
        (status = 200, description = "Files, oldest first", body = Vec<FileRecord>),
        (status = 400, description = "Unknown usage tag", body = ApiError),
    ),
))]
pub async fn list_by_usage(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
) -> ApiResult<Json<Vec<FileRecord>>> {
    let usage = UsageTag::from_str(&tag).map_err(SprintError::from)?;
    let files = state.services.files.list_by_usage(usage).await?;
    Ok(Json(files))
}

/// POST /api/v1/files/sweep - Run one temporary file sweep now
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/v1/files/sweep",
    tag = "Files",
    responses(
        (status = 200, description = "Sweep report", body = SweepReport),
        (status = 503, description = "Store unavailable", body = ApiError),
    ),
))]
pub async fn sweep_files(State(state): State<Arc<AppState>>) -> ApiResult<Json<SweepReport>> {
    let report = state.services.files.sweep().await?;
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_sweep(&report);
    }
    Ok(Json(report))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(upload_file))
        .route("/sweep", post(sweep_files))
        .route("/usage/:tag", get(list_by_usage))
        .route("/:id", get(get_file).delete(delete_file))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_str_trims_and_drops_blank() {
        let mut headers = HeaderMap::new();
        headers.insert(FILE_NAME_HEADER, HeaderValue::from_static("  photo.png "));
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("   "));

        assert_eq!(header_str(&headers, FILE_NAME_HEADER).as_deref(), Some("photo.png"));
        assert_eq!(header_str(&headers, USER_ID_HEADER), None);
        assert_eq!(header_str(&headers, "x-missing"), None);
    }
}
