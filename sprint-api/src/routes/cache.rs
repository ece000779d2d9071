//! Cache Administration Routes

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::delete,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sprint_core::{EntityKind, SprintError};

use crate::error::ApiResult;
use crate::state::AppState;
#[cfg(feature = "openapi")]
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FlushResponse {
    pub kind: EntityKind,
    /// Entries removed from the backend
    pub removed: u64,
}

fn parse_kind(raw: &str) -> Result<EntityKind, SprintError> {
    match raw.trim().to_lowercase().replace(['-', '_'], "").as_str() {
        "file" | "files" => Ok(EntityKind::File),
        "event" | "events" => Ok(EntityKind::Event),
        "gallery" | "galleryitem" | "galleryitems" => Ok(EntityKind::GalleryItem),
        "registration" | "registrations" => Ok(EntityKind::Registration),
        "payment" | "payments" => Ok(EntityKind::Payment),
        _ => Err(SprintError::invalid_value(
            "kind",
            format!("unknown entity kind '{}'", raw),
        )),
    }
}

/// DELETE /api/v1/cache/{kind} - Drop every cached entry of one entity kind
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/api/v1/cache/{kind}",
    tag = "Cache",
    params(("kind" = String, Path, description = "file, event, gallery, registration or payment")),
    responses(
        (status = 200, description = "Entries flushed", body = FlushResponse),
        (status = 400, description = "Unknown entity kind", body = ApiError),
    ),
))]
pub async fn flush_kind(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> ApiResult<Json<FlushResponse>> {
    let kind = parse_kind(&kind)?;
    let removed = state.services.flush_cache(kind).await;
    Ok(Json(FlushResponse { kind, removed }))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/:kind", delete(flush_kind))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind_variants() {
        assert_eq!(parse_kind("File").unwrap(), EntityKind::File);
        assert_eq!(parse_kind("gallery-item").unwrap(), EntityKind::GalleryItem);
        assert_eq!(parse_kind("GALLERY").unwrap(), EntityKind::GalleryItem);
        assert_eq!(parse_kind("payments").unwrap(), EntityKind::Payment);
        assert!(parse_kind("team").is_err());
    }
}
