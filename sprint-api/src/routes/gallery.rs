//! Gallery REST API Routes

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use sprint_core::{GalleryItem, GalleryItemId, SprintError};
use sprint_lifecycle::{GalleryEntry, NewGalleryItem};

use crate::error::ApiResult;
use crate::state::AppState;
#[cfg(feature = "openapi")]
use crate::error::ApiError;

/// POST /api/v1/gallery - Create a gallery item and claim its photo
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/v1/gallery",
    tag = "Gallery",
    request_body = NewGalleryItem,
    responses(
        (status = 201, description = "Gallery item created", body = GalleryItem),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Photo not found", body = ApiError),
    ),
))]
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewGalleryItem>,
) -> ApiResult<impl IntoResponse> {
    let item = state.services.gallery.create(req).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /api/v1/gallery - List live items, newest first, with photo URLs
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/v1/gallery",
    tag = "Gallery",
    responses((status = 200, description = "Gallery entries", body = Vec<GalleryEntry>)),
))]
pub async fn list_items(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<GalleryEntry>>> {
    Ok(Json(state.services.gallery.list().await?))
}

/// DELETE /api/v1/gallery/{id} - Soft delete an item and release its photo
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/api/v1/gallery/{id}",
    tag = "Gallery",
    params(("id" = String, Path, description = "Gallery item id")),
    responses(
        (status = 200, description = "Deleted item", body = GalleryItem),
        (status = 404, description = "Item not found or already deleted", body = ApiError),
    ),
))]
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<GalleryItem>> {
    let id = GalleryItemId::parse(&id).map_err(SprintError::from)?;
    Ok(Json(state.services.gallery.delete(id).await?))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/:id", delete(delete_item))
        .with_state(state)
}
