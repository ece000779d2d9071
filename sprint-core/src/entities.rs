//! Persistent entity records.

use serde::{Deserialize, Serialize};

use crate::{
    EventId, FileId, GalleryItemId, PaymentSnapshot, PaymentStatus, RegistrationId, Retention,
    Shift, Timestamp, UsageTag, UserId,
};

// ============================================================================
// FILES
// ============================================================================

/// An uploaded binary object and its lifecycle state.
///
/// Files do not know their owners. Owners hold file ids, and the usage tag
/// only records which kind of owner claimed the file last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FileRecord {
    pub file_id: FileId,
    /// Generated object name, `<millis>-<random><ext>`.
    pub name: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Public URL returned by object storage.
    pub url: String,
    /// Handle used to delete the backing object.
    pub storage_handle: String,
    pub owner: Option<UserId>,
    pub retention: Retention,
    pub usage: UsageTag,
    pub is_deleted: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub updated_at: Timestamp,
}

impl FileRecord {
    /// Whether the sweep may reclaim this record given `cutoff`.
    pub fn is_reclaimable(&self, cutoff: Timestamp) -> bool {
        self.retention == Retention::Temporary && self.created_at < cutoff
    }
}

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Location {
    pub landmark: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RegistrationCharge {
    pub currency: String,
    pub amount: u64,
    pub is_mandatory: bool,
}

impl Default for RegistrationCharge {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
            amount: 0,
            is_mandatory: false,
        }
    }
}

/// Allowed team size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Participants {
    pub min: u32,
    pub max: u32,
}

impl Default for Participants {
    fn default() -> Self {
        Self { min: 2, max: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EventRecord {
    pub event_id: EventId,
    pub name: String,
    pub event_type: String,
    pub description: String,
    pub organiser: String,
    pub location: Location,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub event_date: Timestamp,
    pub shift: Shift,
    pub photos: Vec<FileId>,
    pub rule_book: Option<FileId>,
    pub registration_charge: RegistrationCharge,
    pub participants: Participants,
    pub uploaded_by: Option<UserId>,
    pub is_deleted: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub updated_at: Timestamp,
}

impl EventRecord {
    /// Every file this event currently references.
    pub fn file_ids(&self) -> Vec<FileId> {
        let mut ids = self.photos.clone();
        ids.extend(self.rule_book);
        ids
    }
}

// ============================================================================
// GALLERY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GalleryItem {
    pub item_id: GalleryItemId,
    pub photo: FileId,
    pub alt: String,
    pub description: String,
    pub kind: String,
    pub is_deleted: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub updated_at: Timestamp,
}

// ============================================================================
// REGISTRATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TeamMember {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub college: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RegistrationRecord {
    pub registration_id: RegistrationId,
    pub team_name: String,
    pub team: Vec<TeamMember>,
    pub event_ids: Vec<EventId>,
    pub amount: u64,
    /// Mirror of the latest payment. Absent until a payment is created.
    pub payment: Option<PaymentSnapshot>,
    /// Sequential decimal id, assigned once on the first confirmed payment.
    pub team_id: Option<String>,
    pub is_deleted: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub updated_at: Timestamp,
}

impl RegistrationRecord {
    pub fn payment_status(&self) -> Option<PaymentStatus> {
        self.payment.map(|p| p.status)
    }

    /// Contact address for confirmation mail.
    pub fn primary_email(&self) -> Option<&str> {
        self.team
            .first()
            .map(|m| m.email.as_str())
            .filter(|e| !e.is_empty())
    }
}

/// Criteria for listing registrations. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RegistrationFilter {
    /// Case-insensitive substring of the team name.
    pub team_name: Option<String>,
    /// Case-insensitive substring of the team id.
    pub team_id: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    /// Defaults to excluding deleted registrations.
    pub is_deleted: Option<bool>,
}

impl RegistrationFilter {
    pub fn matches(&self, record: &RegistrationRecord) -> bool {
        let contains = |haystack: &str, needle: &str| {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        };

        if record.is_deleted != self.is_deleted.unwrap_or(false) {
            return false;
        }
        if let Some(name) = &self.team_name {
            if !contains(&record.team_name, name) {
                return false;
            }
        }
        if let Some(team_id) = &self.team_id {
            match &record.team_id {
                Some(actual) if contains(actual, team_id) => {}
                _ => return false,
            }
        }
        if let Some(status) = self.payment_status {
            if record.payment_status() != Some(status) {
                return false;
            }
        }
        true
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 10;

    /// Build a page request, replacing zero or missing values with defaults.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(1),
            limit: limit.filter(|l| *l > 0).unwrap_or(Self::DEFAULT_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit.max(1)))
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u32,
}
