//! Payment REST API Routes
//!
//! Every status change goes through the payment state table:
//! `Pending -> Completed | Failed`, `Completed -> Refunded`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sprint_core::{PaymentId, PaymentRecord, PaymentStatus, SprintError};
use sprint_lifecycle::{NewPayment, TransitionOutcome};

use crate::error::ApiResult;
use crate::state::AppState;
use crate::telemetry::METRICS;
#[cfg(feature = "openapi")]
use crate::error::ApiError;

/// Body of `PATCH /payments/{id}/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatusRequest {
    pub status: String,
}

/// POST /api/v1/payments - Open a pending payment for a registration
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/v1/payments",
    tag = "Payments",
    request_body = NewPayment,
    responses(
        (status = 201, description = "Pending payment created", body = PaymentRecord),
        (status = 404, description = "Registration not found", body = ApiError),
        (status = 409, description = "Registration already paid, refunded or has a pending payment", body = ApiError),
    ),
))]
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewPayment>,
) -> ApiResult<impl IntoResponse> {
    let payment = state.services.payments.create_payment(req).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// GET /api/v1/payments/{id} - Get a payment
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/v1/payments/{id}",
    tag = "Payments",
    params(("id" = String, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment", body = PaymentRecord),
        (status = 404, description = "Payment not found", body = ApiError),
    ),
))]
pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<PaymentRecord>> {
    let id = PaymentId::parse(&id).map_err(SprintError::from)?;
    Ok(Json(state.services.payments.get_payment(id).await?))
}

/// PATCH /api/v1/payments/{id}/status - Apply a status transition
#[cfg_attr(feature = "openapi", utoipa::path(
    patch,
    path = "/api/v1/payments/{id}/status",
    tag = "Payments",
    params(("id" = String, Path, description = "Payment id")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Transition applied", body = TransitionOutcome),
        (status = 400, description = "Malformed id or status", body = ApiError),
        (status = 404, description = "Payment not found", body = ApiError),
        (status = 409, description = "Transition not allowed", body = ApiError),
    ),
))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<TransitionOutcome>> {
    let status = PaymentStatus::from_db_str(&req.status).map_err(SprintError::from)?;
    let outcome = state.services.payments.transition(&id, status).await?;
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_payment_transition(outcome.payment.status);
    }
    Ok(Json(outcome))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(create_payment))
        .route("/:id", get(get_payment))
        .route("/:id/status", patch(update_status))
        .with_state(state)
}
