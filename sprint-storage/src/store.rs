//! Persistent store trait.
//!
//! Operations are grouped per entity and named `<entity>_<verb>`. Besides
//! plain CRUD the store offers the atomic primitives the domain relies on
//! for serialization: conditional updates that check the current state in
//! the same statement that changes it, and a compare-and-set counter.

use async_trait::async_trait;
use sprint_core::{
    EventId, EventRecord, FileId, FileRecord, GalleryItem, GalleryItemId, PageRequest, PaymentId,
    PaymentRecord, PaymentSnapshot, PaymentStatus, RegistrationFilter, RegistrationId,
    RegistrationRecord, Retention, SprintResult, Timestamp, UsageTag,
};

#[async_trait]
pub trait AsyncStore: Send + Sync {
    // === FILES ===

    /// Insert a new file record. Fails with `AlreadyExists` on duplicate id.
    async fn file_insert(&self, file: &FileRecord) -> SprintResult<()>;

    async fn file_get(&self, id: FileId) -> SprintResult<Option<FileRecord>>;

    /// Files carrying `usage`, oldest first. Soft-deleted files are excluded.
    async fn file_list_by_usage(&self, usage: UsageTag) -> SprintResult<Vec<FileRecord>>;

    /// Set usage tag and retention in one update. `None` if the file is gone.
    async fn file_set_usage(
        &self,
        id: FileId,
        usage: UsageTag,
        retention: Retention,
    ) -> SprintResult<Option<FileRecord>>;

    /// Remove the record. Returns what was removed.
    async fn file_delete(&self, id: FileId) -> SprintResult<Option<FileRecord>>;

    /// Remove the record only if it is still `Temporary` and was created
    /// before `cutoff`, checked atomically with the removal.
    async fn file_delete_if_temporary(
        &self,
        id: FileId,
        cutoff: Timestamp,
    ) -> SprintResult<Option<FileRecord>>;

    /// Candidate files for the sweep, oldest first.
    async fn file_list_temporary_before(
        &self,
        cutoff: Timestamp,
        limit: usize,
    ) -> SprintResult<Vec<FileRecord>>;

    // === EVENTS ===

    async fn event_insert(&self, event: &EventRecord) -> SprintResult<()>;

    async fn event_get(&self, id: EventId) -> SprintResult<Option<EventRecord>>;

    /// Events not soft-deleted, ordered by event date.
    async fn event_list(&self) -> SprintResult<Vec<EventRecord>>;

    /// Replace the stored event. Fails with `NotFound` if it does not exist.
    async fn event_update(&self, event: &EventRecord) -> SprintResult<()>;

    // === GALLERY ===

    async fn gallery_insert(&self, item: &GalleryItem) -> SprintResult<()>;

    async fn gallery_get(&self, id: GalleryItemId) -> SprintResult<Option<GalleryItem>>;

    /// Items not soft-deleted, newest first.
    async fn gallery_list(&self) -> SprintResult<Vec<GalleryItem>>;

    async fn gallery_update(&self, item: &GalleryItem) -> SprintResult<()>;

    // === REGISTRATIONS ===

    async fn registration_insert(&self, registration: &RegistrationRecord) -> SprintResult<()>;

    async fn registration_get(&self, id: RegistrationId)
        -> SprintResult<Option<RegistrationRecord>>;

    /// Matching registrations for one page, newest first, plus the total
    /// number of matches.
    async fn registration_filter(
        &self,
        filter: &RegistrationFilter,
        page: PageRequest,
    ) -> SprintResult<(Vec<RegistrationRecord>, u64)>;

    /// Overwrite the embedded payment snapshot. `None` if the registration
    /// does not exist.
    async fn registration_set_payment(
        &self,
        id: RegistrationId,
        snapshot: PaymentSnapshot,
    ) -> SprintResult<Option<RegistrationRecord>>;

    /// Set the team id unless one is already present. Returns the record as
    /// stored afterwards, so the caller can see which id won.
    async fn registration_set_team_id_if_absent(
        &self,
        id: RegistrationId,
        team_id: &str,
    ) -> SprintResult<Option<RegistrationRecord>>;

    /// Numerically largest team id issued so far.
    async fn registration_max_team_id(&self) -> SprintResult<Option<String>>;

    // === PAYMENTS ===

    async fn payment_insert(&self, payment: &PaymentRecord) -> SprintResult<()>;

    async fn payment_get(&self, id: PaymentId) -> SprintResult<Option<PaymentRecord>>;

    /// Compare-and-set on the status. `None` if the payment does not exist or
    /// its status is no longer `expected`.
    async fn payment_update_status(
        &self,
        id: PaymentId,
        expected: PaymentStatus,
        new_status: PaymentStatus,
    ) -> SprintResult<Option<PaymentRecord>>;

    /// All payments of a registration, oldest first.
    async fn payments_for_registration(
        &self,
        id: RegistrationId,
    ) -> SprintResult<Vec<PaymentRecord>>;

    // === COUNTERS ===

    /// Current value of a named decimal counter.
    async fn counter_get(&self, name: &str) -> SprintResult<Option<String>>;

    /// Set the counter to `new_value` if it currently equals `expected`
    /// (`None` meaning the counter does not exist yet). Returns whether the
    /// swap happened.
    async fn counter_compare_and_set(
        &self,
        name: &str,
        expected: Option<&str>,
        new_value: &str,
    ) -> SprintResult<bool>;

    // === HEALTH ===

    /// Round-trip to the backing store.
    async fn ping(&self) -> SprintResult<()>;
}
