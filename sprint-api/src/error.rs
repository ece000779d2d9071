//! Error Types for the TechSprint API
//!
//! This module defines error handling for the HTTP layer:
//! - `ErrorCode` for categorizing errors on the wire
//! - `ApiError` for structured error responses
//! - Conversions from domain, database and serialization errors
//!
//! All errors are serialized as JSON with the matching HTTP status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sprint_core::{ErrorKind, SprintError, StateError, StorageError};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// An id in the path or body is not a valid id
    InvalidId,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested entity does not exist or was deleted
    EntityNotFound,

    /// Requested page lies beyond the last page
    PageOutOfRange,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Entity with the same identifier already exists
    EntityAlreadyExists,

    /// Payment transition outside the state table
    InvalidTransition,

    /// Registration already has a completed, refunded or pending payment
    PaymentConflict,

    /// Concurrent modification detected
    ConcurrentModification,

    // ========================================================================
    // Partial Failure (207)
    // ========================================================================
    /// The primary write committed but a follow-up step did not
    PartialFailure,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Database operation failed
    DatabaseError,

    /// Store or a required collaborator is unreachable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::MissingField | ErrorCode::InvalidId => {
                StatusCode::BAD_REQUEST
            }

            ErrorCode::EntityNotFound | ErrorCode::PageOutOfRange => StatusCode::NOT_FOUND,

            ErrorCode::EntityAlreadyExists
            | ErrorCode::InvalidTransition
            | ErrorCode::PaymentConflict
            | ErrorCode::ConcurrentModification => StatusCode::CONFLICT,

            ErrorCode::PartialFailure => StatusCode::MULTI_STATUS,

            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::InvalidId => "Invalid id",
            ErrorCode::EntityNotFound => "Entity not found",
            ErrorCode::PageOutOfRange => "Requested page does not exist",
            ErrorCode::EntityAlreadyExists => "Entity already exists",
            ErrorCode::InvalidTransition => "Payment transition not allowed",
            ErrorCode::PaymentConflict => "Payment conflicts with the registration state",
            ErrorCode::ConcurrentModification => "Concurrent modification detected",
            ErrorCode::PartialFailure => "Operation partially completed",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response returned by every endpoint on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn entity_not_found(entity_type: &str, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("{} with id {} not found", entity_type, id),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Map a domain error onto the wire. The status follows the error kind;
/// the code narrows it down.
impl From<SprintError> for ApiError {
    fn from(err: SprintError) -> Self {
        let message = err.to_string();
        let code = match (&err, err.kind()) {
            (SprintError::Validation(sprint_core::ValidationError::InvalidId { .. }), _) => {
                ErrorCode::InvalidId
            }
            (SprintError::Validation(sprint_core::ValidationError::RequiredFieldMissing { .. }), _) => {
                ErrorCode::MissingField
            }
            (_, ErrorKind::InvalidArgument) => ErrorCode::InvalidInput,
            (SprintError::State(StateError::PageOutOfRange { .. }), _) => ErrorCode::PageOutOfRange,
            (_, ErrorKind::NotFound) => ErrorCode::EntityNotFound,
            (SprintError::Storage(StorageError::AlreadyExists { .. }), _) => {
                ErrorCode::EntityAlreadyExists
            }
            (SprintError::State(StateError::InvalidTransition { .. }), _) => {
                ErrorCode::InvalidTransition
            }
            (SprintError::State(StateError::ConcurrentModification { .. }), _) => {
                ErrorCode::ConcurrentModification
            }
            (_, ErrorKind::Conflict) => ErrorCode::PaymentConflict,
            (_, ErrorKind::PartialFailure) => ErrorCode::PartialFailure,
            (SprintError::Storage(StorageError::Corrupt { .. }), _) => ErrorCode::DatabaseError,
            (_, ErrorKind::Unavailable) => ErrorCode::ServiceUnavailable,
        };

        match err.kind() {
            ErrorKind::Unavailable => tracing::error!(error = %err, "Request failed"),
            _ => tracing::debug!(error = %err, "Request rejected"),
        }
        ApiError::new(code, message)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use sprint_core::{EntityKind, ObjectStoreError, PaymentStatus, ValidationError};

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidId.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::EntityNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::InvalidTransition.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::PartialFailure.status_code(), StatusCode::MULTI_STATUS);
        assert_eq!(
            ErrorCode::ServiceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_sprint_error_kinds_map_to_statuses() {
        let cases: Vec<(SprintError, StatusCode)> = vec![
            (
                ValidationError::InvalidId {
                    field: "file_id".to_string(),
                    value: "nope".to_string(),
                }
                .into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                SprintError::not_found(EntityKind::Event, "e1"),
                StatusCode::NOT_FOUND,
            ),
            (
                StateError::InvalidTransition {
                    from: PaymentStatus::Completed,
                    to: PaymentStatus::Pending,
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                StateError::AlreadyPaid {
                    registration_id: "r1".to_string(),
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                StorageError::Unavailable {
                    reason: "down".to_string(),
                }
                .into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ObjectStoreError::DeleteFailed {
                    handle: "h".to_string(),
                    reason: "timeout".to_string(),
                }
                .into(),
                StatusCode::MULTI_STATUS,
            ),
        ];

        for (err, status) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status_code(), status, "{}", api);
        }
    }

    #[test]
    fn test_page_out_of_range_is_not_found() {
        let api: ApiError = SprintError::from(StateError::PageOutOfRange {
            page: 4,
            total_pages: 2,
        })
        .into();
        assert_eq!(api.code, ErrorCode::PageOutOfRange);
        assert_eq!(api.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::entity_not_found("Payment", "p1");
        let json = serde_json::to_string(&err)?;
        assert!(json.contains("ENTITY_NOT_FOUND"));
        assert!(!json.contains("details"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }

    #[test]
    fn test_error_with_details() {
        let details = serde_json::json!({ "field": "amount" });
        let err = ApiError::invalid_input("bad amount").with_details(details.clone());
        assert_eq!(err.details, Some(details));
    }
}
