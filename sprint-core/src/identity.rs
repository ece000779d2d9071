//! Identity types for Sprint entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Current wall-clock time.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Declares a UUIDv7-backed identifier newtype.
///
/// Each id gets its own type so a `FileId` can never be passed where a
/// `PaymentId` is expected. Parsing reports the field name on failure.
macro_rules! define_entity_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new timestamp-sortable id.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parse from the textual form used on the wire.
            pub fn parse(value: &str) -> Result<Self, ValidationError> {
                Uuid::parse_str(value.trim())
                    .map(Self)
                    .map_err(|_| ValidationError::InvalidId {
                        field: $field.to_string(),
                        value: value.to_string(),
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_entity_id!(
    /// Identifier of an uploaded file.
    FileId,
    "file_id"
);
define_entity_id!(
    /// Identifier of an event listing.
    EventId,
    "event_id"
);
define_entity_id!(
    /// Identifier of a team registration.
    RegistrationId,
    "registration_id"
);
define_entity_id!(
    /// Identifier of a payment attempt.
    PaymentId,
    "payment_id"
);
define_entity_id!(
    /// Identifier of a gallery entry.
    GalleryItemId,
    "gallery_item_id"
);
define_entity_id!(
    /// Identifier of the principal that uploaded or created something.
    UserId,
    "user_id"
);
