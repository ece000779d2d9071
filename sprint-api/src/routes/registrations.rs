//! Registration REST API Routes
//!
//! Also hosts the payment gateway callback, which is addressed by
//! registration and assigns the team id on the first completed payment.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sprint_core::{
    Page, PageRequest, PaymentId, PaymentStatus, RegistrationFilter, RegistrationId,
    RegistrationRecord, SprintError,
};
use sprint_lifecycle::{CallbackOutcome, NewRegistration};

use crate::error::ApiResult;
use crate::state::AppState;
use crate::telemetry::METRICS;
#[cfg(feature = "openapi")]
use crate::error::ApiError;

// ============================================================================
// TYPES
// ============================================================================

/// Body of `POST /registrations/filter`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FilterRequest {
    #[serde(flatten)]
    pub filter: RegistrationFilter,
    /// 1-based page number (default 1)
    #[serde(default)]
    pub page: Option<u32>,
    /// Page size (default 10)
    #[serde(default)]
    pub limit: Option<u32>,
}

/// One page of registrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RegistrationPage {
    pub items: Vec<RegistrationRecord>,
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u32,
}

impl From<Page<RegistrationRecord>> for RegistrationPage {
    fn from(page: Page<RegistrationRecord>) -> Self {
        Self {
            items: page.items,
            total: page.total,
            total_pages: page.total_pages,
            current_page: page.current_page,
        }
    }
}

/// Body of `POST /registrations/callback`. Ids and status arrive as text so
/// a malformed value is reported as a validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CallbackRequest {
    pub registration_id: String,
    pub payment_id: String,
    pub status: String,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/registrations - Register a team
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/v1/registrations",
    tag = "Registrations",
    request_body = NewRegistration,
    responses(
        (status = 201, description = "Registration stored", body = RegistrationRecord),
        (status = 400, description = "Invalid request", body = ApiError),
    ),
))]
pub async fn create_registration(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewRegistration>,
) -> ApiResult<impl IntoResponse> {
    let registration = state.services.registrations.create(req).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

/// GET /api/v1/registrations/{id} - Get a registration
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/v1/registrations/{id}",
    tag = "Registrations",
    params(("id" = String, Path, description = "Registration id")),
    responses(
        (status = 200, description = "Registration", body = RegistrationRecord),
        (status = 404, description = "Registration not found", body = ApiError),
    ),
))]
pub async fn get_registration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<RegistrationRecord>> {
    let id = RegistrationId::parse(&id).map_err(SprintError::from)?;
    Ok(Json(state.services.registrations.get(id).await?))
}

/// POST /api/v1/registrations/filter - Filter registrations, newest first
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/v1/registrations/filter",
    tag = "Registrations",
    request_body = FilterRequest,
    responses(
        (status = 200, description = "One page of registrations", body = RegistrationPage),
        (status = 404, description = "Page beyond the last page", body = ApiError),
    ),
))]
pub async fn filter_registrations(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FilterRequest>,
) -> ApiResult<Json<RegistrationPage>> {
    let page = PageRequest::new(req.page, req.limit);
    let result = state.services.registrations.filter(&req.filter, page).await?;
    Ok(Json(result.into()))
}

/// POST /api/v1/registrations/callback - Payment gateway callback
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/v1/registrations/callback",
    tag = "Registrations",
    request_body = CallbackRequest,
    responses(
        (status = 200, description = "Callback applied (or already applied)", body = CallbackOutcome),
        (status = 400, description = "Malformed id or status", body = ApiError),
        (status = 404, description = "Payment or registration not found", body = ApiError),
        (status = 409, description = "Transition not allowed or payment mismatch", body = ApiError),
    ),
))]
pub async fn payment_callback(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CallbackRequest>,
) -> ApiResult<Json<CallbackOutcome>> {
    let registration_id = RegistrationId::parse(&req.registration_id).map_err(SprintError::from)?;
    let payment_id = PaymentId::parse(&req.payment_id).map_err(SprintError::from)?;
    let status = PaymentStatus::from_db_str(&req.status).map_err(SprintError::from)?;

    let outcome = state
        .services
        .payments
        .payment_callback(registration_id, payment_id, status)
        .await?;
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_payment_transition(outcome.payment.status);
    }
    Ok(Json(outcome))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(create_registration))
        .route("/filter", post(filter_registrations))
        .route("/callback", post(payment_callback))
        .route("/:id", get(get_registration))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_request_flattens_filter_fields() -> Result<(), serde_json::Error> {
        let req: FilterRequest = serde_json::from_str(
            r#"{"team_name":"volt","payment_status":"Completed","page":2,"limit":5}"#,
        )?;
        assert_eq!(req.filter.team_name.as_deref(), Some("volt"));
        assert_eq!(req.filter.payment_status, Some(PaymentStatus::Completed));
        assert_eq!(req.page, Some(2));
        assert_eq!(req.limit, Some(5));
        Ok(())
    }

    #[test]
    fn test_filter_request_empty_body_defaults() -> Result<(), serde_json::Error> {
        let req: FilterRequest = serde_json::from_str("{}")?;
        assert_eq!(req, FilterRequest::default());
        Ok(())
    }
}
