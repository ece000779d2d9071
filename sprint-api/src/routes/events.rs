//! Event REST API Routes
//!
//! Events own their photos and rule book. Changing either attaches the new
//! files and releases the old ones back to `Temporary`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sprint_core::{EventId, EventRecord, FileId, SprintError};
use sprint_lifecycle::NewEvent;

use crate::error::ApiResult;
use crate::state::AppState;
#[cfg(feature = "openapi")]
use crate::error::ApiError;

/// Body of `PUT /events/{id}/photos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReplacePhotosRequest {
    pub photos: Vec<FileId>,
}

/// Body of `PUT /events/{id}/rule-book`. `null` clears the rule book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SetRuleBookRequest {
    pub rule_book: Option<FileId>,
}

fn parse_event_id(raw: &str) -> Result<EventId, SprintError> {
    EventId::parse(raw).map_err(SprintError::from)
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/events - Create an event and claim its files
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    request_body = NewEvent,
    responses(
        (status = 201, description = "Event created", body = EventRecord),
        (status = 400, description = "Invalid request", body = ApiError),
    ),
))]
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewEvent>,
) -> ApiResult<impl IntoResponse> {
    let event = state.services.events.create(req).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /api/v1/events - List live events by date
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "Events",
    responses((status = 200, description = "Events", body = Vec<EventRecord>)),
))]
pub async fn list_events(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<EventRecord>>> {
    Ok(Json(state.services.events.list().await?))
}

/// GET /api/v1/events/{id} - Get an event
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    tag = "Events",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event", body = EventRecord),
        (status = 404, description = "Event not found or deleted", body = ApiError),
    ),
))]
pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<EventRecord>> {
    let id = parse_event_id(&id)?;
    Ok(Json(state.services.events.get(id).await?))
}

/// PUT /api/v1/events/{id}/photos - Replace the photo set
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/api/v1/events/{id}/photos",
    tag = "Events",
    params(("id" = String, Path, description = "Event id")),
    request_body = ReplacePhotosRequest,
    responses(
        (status = 200, description = "Updated event", body = EventRecord),
        (status = 404, description = "Event not found or deleted", body = ApiError),
    ),
))]
pub async fn replace_photos(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ReplacePhotosRequest>,
) -> ApiResult<Json<EventRecord>> {
    let id = parse_event_id(&id)?;
    Ok(Json(state.services.events.replace_photos(id, req.photos).await?))
}

/// PUT /api/v1/events/{id}/rule-book - Set or clear the rule book
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/api/v1/events/{id}/rule-book",
    tag = "Events",
    params(("id" = String, Path, description = "Event id")),
    request_body = SetRuleBookRequest,
    responses(
        (status = 200, description = "Updated event", body = EventRecord),
        (status = 404, description = "Event not found or deleted", body = ApiError),
    ),
))]
pub async fn set_rule_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetRuleBookRequest>,
) -> ApiResult<Json<EventRecord>> {
    let id = parse_event_id(&id)?;
    Ok(Json(state.services.events.set_rule_book(id, req.rule_book).await?))
}

/// DELETE /api/v1/events/{id} - Soft delete an event and release its files
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/api/v1/events/{id}",
    tag = "Events",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Deleted event", body = EventRecord),
        (status = 404, description = "Event not found or already deleted", body = ApiError),
    ),
))]
pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<EventRecord>> {
    let id = parse_event_id(&id)?;
    Ok(Json(state.services.events.delete(id).await?))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/:id", get(get_event).delete(delete_event))
        .route("/:id/photos", put(replace_photos))
        .route("/:id/rule-book", put(set_rule_book))
        .with_state(state)
}
