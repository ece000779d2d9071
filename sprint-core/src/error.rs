//! Error types for Sprint operations

use std::fmt;
use thiserror::Error;

use crate::{EntityKind, PaymentStatus};

/// The externally visible classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed id or missing required field. Detected before any side effect.
    InvalidArgument,
    /// Entity absent or soft-deleted.
    NotFound,
    /// Duplicate payment or a transition outside the state table.
    Conflict,
    /// The persistent store or a required collaborator is unreachable.
    Unavailable,
    /// The primary write committed but a follow-up step did not.
    PartialFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Unavailable => "Unavailable",
            ErrorKind::PartialFailure => "PartialFailure",
        };
        f.write_str(name)
    }
}

/// Persistent store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("{entity} with id {id} already exists")]
    AlreadyExists { entity: EntityKind, id: String },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Query failed for {entity}: {reason}")]
    QueryFailed { entity: EntityKind, reason: String },

    #[error("Stored {entity} could not be decoded: {reason}")]
    Corrupt { entity: EntityKind, reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("{field} is not a valid id: '{value}'")]
    InvalidId { field: String, value: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// State machine and concurrency conflicts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Invalid payment transition from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Registration {registration_id} is already paid")]
    AlreadyPaid { registration_id: String },

    #[error("Registration {registration_id} is already refunded")]
    AlreadyRefunded { registration_id: String },

    #[error("Registration {registration_id} already has a pending payment")]
    PaymentInProgress { registration_id: String },

    #[error("Payment {payment_id} does not belong to registration {registration_id}")]
    PaymentMismatch {
        payment_id: String,
        registration_id: String,
    },

    #[error("{entity} {id} was modified concurrently")]
    ConcurrentModification { entity: EntityKind, id: String },

    #[error("Requested page {page} exceeds total pages {total_pages}")]
    PageOutOfRange { page: u32, total_pages: u64 },
}

/// Object storage collaborator errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ObjectStoreError {
    #[error("Upload failed: {reason}")]
    UploadFailed { reason: String },

    #[error("Delete of object {handle} failed: {reason}")]
    DeleteFailed { handle: String, reason: String },

    #[error("Object storage unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Mail collaborator errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MailError {
    #[error("Mail to {to} failed: {reason}")]
    SendFailed { to: String, reason: String },

    #[error("Mail relay unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Cache backend errors. These never escape the cache layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache value for {key} could not be (de)serialized: {reason}")]
    Serialization { key: String, reason: String },
}

/// Master error type for all Sprint errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SprintError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Object storage error: {0}")]
    ObjectStore(#[from] ObjectStoreError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl SprintError {
    pub fn not_found(entity: EntityKind, id: impl fmt::Display) -> Self {
        StorageError::NotFound {
            entity,
            id: id.to_string(),
        }
        .into()
    }

    pub fn missing_field(field: &str) -> Self {
        ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        }
        .into()
    }

    pub fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
        .into()
    }

    /// Map to the externally visible error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SprintError::Storage(StorageError::NotFound { .. }) => ErrorKind::NotFound,
            SprintError::Storage(StorageError::AlreadyExists { .. }) => ErrorKind::Conflict,
            SprintError::Storage(_) => ErrorKind::Unavailable,
            SprintError::Validation(_) => ErrorKind::InvalidArgument,
            SprintError::State(StateError::PageOutOfRange { .. }) => ErrorKind::NotFound,
            SprintError::State(_) => ErrorKind::Conflict,
            // Records are always removed before their objects.
            SprintError::ObjectStore(ObjectStoreError::DeleteFailed { .. }) => {
                ErrorKind::PartialFailure
            }
            SprintError::ObjectStore(_) => ErrorKind::Unavailable,
            SprintError::Mail(_) => ErrorKind::Unavailable,
            SprintError::Cache(_) => ErrorKind::Unavailable,
        }
    }
}

/// Result type alias for Sprint operations.
pub type SprintResult<T> = Result<T, SprintError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            entity: EntityKind::File,
            id: "abc".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Entity not found"));
        assert!(msg.contains("File"));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = StateError::InvalidTransition {
            from: PaymentStatus::Completed,
            to: PaymentStatus::Pending,
        };
        assert_eq!(
            err.to_string(),
            "Invalid payment transition from Completed to Pending"
        );
    }

    #[test]
    fn test_already_paid_message_is_user_facing() {
        let err = StateError::AlreadyPaid {
            registration_id: "r1".to_string(),
        };
        assert!(err.to_string().contains("already paid"));
        let err = StateError::AlreadyRefunded {
            registration_id: "r1".to_string(),
        };
        assert!(err.to_string().contains("already refunded"));
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            SprintError::not_found(EntityKind::Payment, "p").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            SprintError::missing_field("team_name").kind(),
            ErrorKind::InvalidArgument
        );
        let transition: SprintError = StateError::InvalidTransition {
            from: PaymentStatus::Completed,
            to: PaymentStatus::Pending,
        }
        .into();
        assert_eq!(transition.kind(), ErrorKind::Conflict);
        let store: SprintError = StorageError::Unavailable {
            reason: "connection refused".to_string(),
        }
        .into();
        assert_eq!(store.kind(), ErrorKind::Unavailable);
        let partial: SprintError = ObjectStoreError::DeleteFailed {
            handle: "1-a.png".to_string(),
            reason: "timeout".to_string(),
        }
        .into();
        assert_eq!(partial.kind(), ErrorKind::PartialFailure);
    }

    #[test]
    fn test_page_out_of_range_is_not_found() {
        let err: SprintError = StateError::PageOutOfRange {
            page: 4,
            total_pages: 2,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
