//! Payment status state machine.
//!
//! # State Transition Diagram
//!
//! ```text
//! create() → Pending ──┬── Completed ── Refunded (terminal)
//!                      └── Failed (terminal, retry creates a new payment)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{PaymentId, PaymentMethod, RegistrationId, Timestamp, ValidationError};

// ============================================================================
// PAYMENT STATUS
// ============================================================================

/// Status of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum PaymentStatus {
    /// Created, waiting for the gateway
    Pending,
    /// Gateway confirmed the charge
    Completed,
    /// Gateway rejected the charge
    Failed,
    /// Completed charge was returned
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, ValidationError> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" | "complete" => Ok(PaymentStatus::Completed),
            "failed" | "failure" => Ok(PaymentStatus::Failed),
            // Registrations were once written with "Refundend".
            "refunded" | "refundend" => Ok(PaymentStatus::Refunded),
            _ => Err(ValidationError::InvalidValue {
                field: "payment_status".to_string(),
                reason: format!("unknown payment status '{}'", s),
            }),
        }
    }

    /// Whether `self → next` is an edge of the state table.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Completed, PaymentStatus::Refunded)
        )
    }

    /// Check if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Refunded)
    }

    /// Whether a registration holding this snapshot may open a new payment.
    pub fn allows_new_payment(&self) -> bool {
        matches!(self, PaymentStatus::Failed)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

// ============================================================================
// PAYMENT RECORDS
// ============================================================================

/// A single payment attempt for a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PaymentRecord {
    pub payment_id: PaymentId,
    pub registration_id: RegistrationId,
    /// Amount in the smallest currency unit.
    pub amount: u64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub updated_at: Timestamp,
}

impl PaymentRecord {
    /// A fresh `Pending` attempt.
    pub fn pending(
        registration_id: RegistrationId,
        amount: u64,
        method: PaymentMethod,
        at: Timestamp,
    ) -> Self {
        Self {
            payment_id: PaymentId::new(),
            registration_id,
            amount,
            method,
            status: PaymentStatus::Pending,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn snapshot(&self) -> PaymentSnapshot {
        PaymentSnapshot {
            status: self.status,
            payment_id: self.payment_id,
        }
    }
}

/// The copy of a payment's state embedded in its registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PaymentSnapshot {
    pub status: PaymentStatus,
    pub payment_id: PaymentId,
}
