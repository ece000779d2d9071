//! Enum types shared across the file, event and payment components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

// ============================================================================
// FILE RETENTION
// ============================================================================

/// Whether a file is a candidate for reclamation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Retention {
    /// Reclaimable by the sweep once past the retention cutoff
    #[default]
    Temporary,
    /// Referenced by an owner, never swept
    Permanent,
}

impl Retention {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Retention::Temporary => "Temporary",
            Retention::Permanent => "Permanent",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, ValidationError> {
        match s.to_lowercase().as_str() {
            // The legacy collection spelled it "Temprary".
            "temporary" | "temprary" => Ok(Retention::Temporary),
            "permanent" => Ok(Retention::Permanent),
            _ => Err(ValidationError::InvalidValue {
                field: "retention".to_string(),
                reason: format!("unknown retention class '{}'", s),
            }),
        }
    }
}

impl fmt::Display for Retention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for Retention {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

// ============================================================================
// FILE USAGE TAG
// ============================================================================

/// Which feature a file serves. Drives aggregate cache invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum UsageTag {
    Gallery,
    RuleBook,
    EventPhotos,
    MediaPhotos,
    Brochure,
    #[default]
    Unassigned,
}

impl UsageTag {
    pub const ALL: [UsageTag; 6] = [
        UsageTag::Gallery,
        UsageTag::RuleBook,
        UsageTag::EventPhotos,
        UsageTag::MediaPhotos,
        UsageTag::Brochure,
        UsageTag::Unassigned,
    ];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            UsageTag::Gallery => "Gallery",
            UsageTag::RuleBook => "RuleBook",
            UsageTag::EventPhotos => "EventPhotos",
            UsageTag::MediaPhotos => "MediaPhotos",
            UsageTag::Brochure => "Brochure",
            UsageTag::Unassigned => "Unassigned",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, ValidationError> {
        match s.to_lowercase().as_str() {
            "gallery" => Ok(UsageTag::Gallery),
            "rulebook" | "rule_book" | "rule-book" => Ok(UsageTag::RuleBook),
            "eventphotos" | "event_photos" | "event-photos" => Ok(UsageTag::EventPhotos),
            "mediaphotos" | "media_photos" | "media-photos" => Ok(UsageTag::MediaPhotos),
            "brochure" => Ok(UsageTag::Brochure),
            "unassigned" | "" => Ok(UsageTag::Unassigned),
            _ => Err(ValidationError::InvalidValue {
                field: "usage".to_string(),
                reason: format!("unknown usage tag '{}'", s),
            }),
        }
    }

    /// Whether this tag means some owner currently references the file.
    pub fn is_assigned(&self) -> bool {
        !matches!(self, UsageTag::Unassigned)
    }
}

impl fmt::Display for UsageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for UsageTag {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

// ============================================================================
// PAYMENT METHOD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum PaymentMethod {
    #[serde(rename = "Credit Card")]
    CreditCard,
    #[serde(rename = "Debit Card")]
    DebitCard,
    #[serde(rename = "PayPal")]
    PayPal,
    #[serde(rename = "Bank Transfer")]
    BankTransfer,
    #[serde(rename = "UPI")]
    Upi,
}

impl PaymentMethod {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "Credit Card",
            PaymentMethod::DebitCard => "Debit Card",
            PaymentMethod::PayPal => "PayPal",
            PaymentMethod::BankTransfer => "Bank Transfer",
            PaymentMethod::Upi => "UPI",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ============================================================================
// EVENT SHIFT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Shift {
    #[default]
    Morning,
    Evening,
}

// ============================================================================
// ENTITY KIND
// ============================================================================

/// Entity type discriminator used in errors and cache namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum EntityKind {
    File,
    Event,
    GalleryItem,
    Registration,
    Payment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::File => "File",
            EntityKind::Event => "Event",
            EntityKind::GalleryItem => "GalleryItem",
            EntityKind::Registration => "Registration",
            EntityKind::Payment => "Payment",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
