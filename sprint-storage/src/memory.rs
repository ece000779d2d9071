//! In-memory store for tests and local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use sprint_core::{
    max_team_id, EntityKind, EventId, EventRecord, FileId, FileRecord, GalleryItem, GalleryItemId,
    PageRequest, PaymentId, PaymentRecord, PaymentSnapshot, PaymentStatus, RegistrationFilter,
    RegistrationId, RegistrationRecord, Retention, SprintError, SprintResult, StorageError,
    Timestamp, UsageTag,
};
use tokio::sync::RwLock;

use crate::store::AsyncStore;

/// [`AsyncStore`] over `RwLock<HashMap>` tables.
///
/// Every conditional operation runs under a single write lock, which gives
/// it the same atomicity a single SQL statement has in the Postgres store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    files: RwLock<HashMap<FileId, FileRecord>>,
    events: RwLock<HashMap<EventId, EventRecord>>,
    gallery: RwLock<HashMap<GalleryItemId, GalleryItem>>,
    registrations: RwLock<HashMap<RegistrationId, RegistrationRecord>>,
    payments: RwLock<HashMap<PaymentId, PaymentRecord>>,
    counters: RwLock<HashMap<String, String>>,
    unavailable: AtomicBool,
    fail_registration_writes: AtomicBool,
    fail_file_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store being unreachable: every call fails.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make registration updates fail while everything else works.
    pub fn set_fail_registration_writes(&self, fail: bool) {
        self.fail_registration_writes.store(fail, Ordering::SeqCst);
    }

    /// Make file usage updates fail while everything else works.
    pub fn set_fail_file_writes(&self, fail: bool) {
        self.fail_file_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> SprintResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "in-memory store switched off".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn check_registration_write(&self) -> SprintResult<()> {
        self.check()?;
        if self.fail_registration_writes.load(Ordering::SeqCst) {
            return Err(StorageError::QueryFailed {
                entity: EntityKind::Registration,
                reason: "simulated write failure".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn check_file_write(&self) -> SprintResult<()> {
        self.check()?;
        if self.fail_file_writes.load(Ordering::SeqCst) {
            return Err(StorageError::QueryFailed {
                entity: EntityKind::File,
                reason: "simulated write failure".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn already_exists(entity: EntityKind, id: impl ToString) -> SprintError {
        StorageError::AlreadyExists {
            entity,
            id: id.to_string(),
        }
        .into()
    }
}

#[async_trait]
impl AsyncStore for InMemoryStore {
    // === Files ===

    async fn file_insert(&self, file: &FileRecord) -> SprintResult<()> {
        self.check()?;
        let mut files = self.files.write().await;
        if files.contains_key(&file.file_id) {
            return Err(Self::already_exists(EntityKind::File, file.file_id));
        }
        files.insert(file.file_id, file.clone());
        Ok(())
    }

    async fn file_get(&self, id: FileId) -> SprintResult<Option<FileRecord>> {
        self.check()?;
        Ok(self.files.read().await.get(&id).cloned())
    }

    async fn file_list_by_usage(&self, usage: UsageTag) -> SprintResult<Vec<FileRecord>> {
        self.check()?;
        let mut files: Vec<FileRecord> = self
            .files
            .read()
            .await
            .values()
            .filter(|f| f.usage == usage && !f.is_deleted)
            .cloned()
            .collect();
        files.sort_by_key(|f| f.created_at);
        Ok(files)
    }

    async fn file_set_usage(
        &self,
        id: FileId,
        usage: UsageTag,
        retention: Retention,
    ) -> SprintResult<Option<FileRecord>> {
        self.check_file_write()?;
        let mut files = self.files.write().await;
        Ok(files.get_mut(&id).map(|file| {
            file.usage = usage;
            file.retention = retention;
            file.updated_at = Utc::now();
            file.clone()
        }))
    }

    async fn file_delete(&self, id: FileId) -> SprintResult<Option<FileRecord>> {
        self.check()?;
        Ok(self.files.write().await.remove(&id))
    }

    async fn file_delete_if_temporary(
        &self,
        id: FileId,
        cutoff: Timestamp,
    ) -> SprintResult<Option<FileRecord>> {
        self.check()?;
        let mut files = self.files.write().await;
        match files.get(&id) {
            Some(file) if file.is_reclaimable(cutoff) => Ok(files.remove(&id)),
            _ => Ok(None),
        }
    }

    async fn file_list_temporary_before(
        &self,
        cutoff: Timestamp,
        limit: usize,
    ) -> SprintResult<Vec<FileRecord>> {
        self.check()?;
        let mut files: Vec<FileRecord> = self
            .files
            .read()
            .await
            .values()
            .filter(|f| f.is_reclaimable(cutoff))
            .cloned()
            .collect();
        files.sort_by_key(|f| f.created_at);
        files.truncate(limit);
        Ok(files)
    }

    // === Events ===

    async fn event_insert(&self, event: &EventRecord) -> SprintResult<()> {
        self.check()?;
        let mut events = self.events.write().await;
        if events.contains_key(&event.event_id) {
            return Err(Self::already_exists(EntityKind::Event, event.event_id));
        }
        events.insert(event.event_id, event.clone());
        Ok(())
    }

    async fn event_get(&self, id: EventId) -> SprintResult<Option<EventRecord>> {
        self.check()?;
        Ok(self.events.read().await.get(&id).cloned())
    }

    async fn event_list(&self) -> SprintResult<Vec<EventRecord>> {
        self.check()?;
        let mut events: Vec<EventRecord> = self
            .events
            .read()
            .await
            .values()
            .filter(|e| !e.is_deleted)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.event_date, e.event_id));
        Ok(events)
    }

    async fn event_update(&self, event: &EventRecord) -> SprintResult<()> {
        self.check()?;
        let mut events = self.events.write().await;
        match events.get_mut(&event.event_id) {
            Some(stored) => {
                *stored = event.clone();
                Ok(())
            }
            None => Err(SprintError::not_found(EntityKind::Event, event.event_id)),
        }
    }

    // === Gallery ===

    async fn gallery_insert(&self, item: &GalleryItem) -> SprintResult<()> {
        self.check()?;
        let mut gallery = self.gallery.write().await;
        if gallery.contains_key(&item.item_id) {
            return Err(Self::already_exists(EntityKind::GalleryItem, item.item_id));
        }
        gallery.insert(item.item_id, item.clone());
        Ok(())
    }

    async fn gallery_get(&self, id: GalleryItemId) -> SprintResult<Option<GalleryItem>> {
        self.check()?;
        Ok(self.gallery.read().await.get(&id).cloned())
    }

    async fn gallery_list(&self) -> SprintResult<Vec<GalleryItem>> {
        self.check()?;
        let mut items: Vec<GalleryItem> = self
            .gallery
            .read()
            .await
            .values()
            .filter(|i| !i.is_deleted)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn gallery_update(&self, item: &GalleryItem) -> SprintResult<()> {
        self.check()?;
        let mut gallery = self.gallery.write().await;
        match gallery.get_mut(&item.item_id) {
            Some(stored) => {
                *stored = item.clone();
                Ok(())
            }
            None => Err(SprintError::not_found(EntityKind::GalleryItem, item.item_id)),
        }
    }

    // === Registrations ===

    async fn registration_insert(&self, registration: &RegistrationRecord) -> SprintResult<()> {
        self.check_registration_write()?;
        let mut registrations = self.registrations.write().await;
        if registrations.contains_key(&registration.registration_id) {
            return Err(Self::already_exists(
                EntityKind::Registration,
                registration.registration_id,
            ));
        }
        registrations.insert(registration.registration_id, registration.clone());
        Ok(())
    }

    async fn registration_get(
        &self,
        id: RegistrationId,
    ) -> SprintResult<Option<RegistrationRecord>> {
        self.check()?;
        Ok(self.registrations.read().await.get(&id).cloned())
    }

    async fn registration_filter(
        &self,
        filter: &RegistrationFilter,
        page: PageRequest,
    ) -> SprintResult<(Vec<RegistrationRecord>, u64)> {
        self.check()?;
        let mut matches: Vec<RegistrationRecord> = self
            .registrations
            .read()
            .await
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.registration_id.cmp(&a.registration_id))
        });

        let total = matches.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let items = matches
            .into_iter()
            .skip(offset)
            .take(page.limit as usize)
            .collect();
        Ok((items, total))
    }

    async fn registration_set_payment(
        &self,
        id: RegistrationId,
        snapshot: PaymentSnapshot,
    ) -> SprintResult<Option<RegistrationRecord>> {
        self.check_registration_write()?;
        let mut registrations = self.registrations.write().await;
        Ok(registrations.get_mut(&id).map(|r| {
            r.payment = Some(snapshot);
            r.updated_at = Utc::now();
            r.clone()
        }))
    }

    async fn registration_set_team_id_if_absent(
        &self,
        id: RegistrationId,
        team_id: &str,
    ) -> SprintResult<Option<RegistrationRecord>> {
        self.check_registration_write()?;
        let mut registrations = self.registrations.write().await;
        Ok(registrations.get_mut(&id).map(|r| {
            if r.team_id.is_none() {
                r.team_id = Some(team_id.to_string());
                r.updated_at = Utc::now();
            }
            r.clone()
        }))
    }

    async fn registration_max_team_id(&self) -> SprintResult<Option<String>> {
        self.check()?;
        let registrations = self.registrations.read().await;
        Ok(max_team_id(registrations.values().filter_map(|r| r.team_id.as_deref()))
            .map(str::to_string))
    }

    // === Payments ===

    async fn payment_insert(&self, payment: &PaymentRecord) -> SprintResult<()> {
        self.check()?;
        let mut payments = self.payments.write().await;
        if payments.contains_key(&payment.payment_id) {
            return Err(Self::already_exists(EntityKind::Payment, payment.payment_id));
        }
        payments.insert(payment.payment_id, payment.clone());
        Ok(())
    }

    async fn payment_get(&self, id: PaymentId) -> SprintResult<Option<PaymentRecord>> {
        self.check()?;
        Ok(self.payments.read().await.get(&id).cloned())
    }

    async fn payment_update_status(
        &self,
        id: PaymentId,
        expected: PaymentStatus,
        new_status: PaymentStatus,
    ) -> SprintResult<Option<PaymentRecord>> {
        self.check()?;
        let mut payments = self.payments.write().await;
        match payments.get_mut(&id) {
            Some(p) if p.status == expected => {
                p.status = new_status;
                p.updated_at = Utc::now();
                Ok(Some(p.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn payments_for_registration(
        &self,
        id: RegistrationId,
    ) -> SprintResult<Vec<PaymentRecord>> {
        self.check()?;
        let mut payments: Vec<PaymentRecord> = self
            .payments
            .read()
            .await
            .values()
            .filter(|p| p.registration_id == id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| (p.created_at, p.payment_id));
        Ok(payments)
    }

    // === Counters ===

    async fn counter_get(&self, name: &str) -> SprintResult<Option<String>> {
        self.check()?;
        Ok(self.counters.read().await.get(name).cloned())
    }

    async fn counter_compare_and_set(
        &self,
        name: &str,
        expected: Option<&str>,
        new_value: &str,
    ) -> SprintResult<bool> {
        self.check()?;
        let mut counters = self.counters.write().await;
        if counters.get(name).map(String::as_str) != expected {
            return Ok(false);
        }
        counters.insert(name.to_string(), new_value.to_string());
        Ok(true)
    }

    async fn ping(&self) -> SprintResult<()> {
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sprint_core::{PaymentMethod, TeamMember};

    fn file(created_at: Timestamp) -> FileRecord {
        let id = FileId::new();
        FileRecord {
            file_id: id,
            name: format!("{}.png", id),
            content_type: "image/png".to_string(),
            size_bytes: 1,
            url: format!("memory://objects/{}.png", id),
            storage_handle: format!("{}.png", id),
            owner: None,
            retention: Retention::Temporary,
            usage: UsageTag::Unassigned,
            is_deleted: false,
            created_at,
            updated_at: created_at,
        }
    }

    fn registration(team_id: Option<&str>) -> RegistrationRecord {
        let now = Utc::now();
        RegistrationRecord {
            registration_id: RegistrationId::new(),
            team_name: "Coders".to_string(),
            team: vec![TeamMember {
                name: "Ravi".to_string(),
                email: "ravi@example.com".to_string(),
                phone: "1".to_string(),
                college: None,
            }],
            event_ids: vec![],
            amount: 100,
            payment: None,
            team_id: team_id.map(str::to_string),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_file_insert_duplicate_fails() {
        let store = InMemoryStore::new();
        let f = file(Utc::now());
        store.file_insert(&f).await.unwrap();
        let err = store.file_insert(&f).await.unwrap_err();
        assert_eq!(err.kind(), sprint_core::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_delete_if_temporary_rechecks_retention() {
        let store = InMemoryStore::new();
        let old = file(Utc::now() - Duration::days(2));
        store.file_insert(&old).await.unwrap();
        let cutoff = Utc::now() - Duration::days(1);

        store
            .file_set_usage(old.file_id, UsageTag::Gallery, Retention::Permanent)
            .await
            .unwrap();
        assert!(store
            .file_delete_if_temporary(old.file_id, cutoff)
            .await
            .unwrap()
            .is_none());
        assert!(store.file_get(old.file_id).await.unwrap().is_some());

        store
            .file_set_usage(old.file_id, UsageTag::Unassigned, Retention::Temporary)
            .await
            .unwrap();
        assert!(store
            .file_delete_if_temporary(old.file_id, cutoff)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_temporary_listing_respects_cutoff_and_limit() {
        let store = InMemoryStore::new();
        for days in [5, 4, 3] {
            store.file_insert(&file(Utc::now() - Duration::days(days))).await.unwrap();
        }
        store.file_insert(&file(Utc::now())).await.unwrap();

        let cutoff = Utc::now() - Duration::days(1);
        let all = store.file_list_temporary_before(cutoff, 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].created_at < all[1].created_at);
        assert_eq!(store.file_list_temporary_before(cutoff, 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_payment_cas() {
        let store = InMemoryStore::new();
        let payment =
            PaymentRecord::pending(RegistrationId::new(), 100, PaymentMethod::Upi, Utc::now());
        store.payment_insert(&payment).await.unwrap();

        let updated = store
            .payment_update_status(payment.payment_id, PaymentStatus::Pending, PaymentStatus::Completed)
            .await
            .unwrap();
        assert_eq!(updated.unwrap().status, PaymentStatus::Completed);

        let lost = store
            .payment_update_status(payment.payment_id, PaymentStatus::Pending, PaymentStatus::Failed)
            .await
            .unwrap();
        assert!(lost.is_none());
    }

    #[tokio::test]
    async fn test_team_id_set_only_once() {
        let store = InMemoryStore::new();
        let r = registration(None);
        store.registration_insert(&r).await.unwrap();

        let first = store
            .registration_set_team_id_if_absent(r.registration_id, "7")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.team_id.as_deref(), Some("7"));
        let second = store
            .registration_set_team_id_if_absent(r.registration_id, "8")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.team_id.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_max_team_id_is_numeric() {
        let store = InMemoryStore::new();
        for id in ["9", "10", "2"] {
            store.registration_insert(&registration(Some(id))).await.unwrap();
        }
        store.registration_insert(&registration(None)).await.unwrap();
        assert_eq!(
            store.registration_max_team_id().await.unwrap().as_deref(),
            Some("10")
        );
    }

    #[tokio::test]
    async fn test_counter_cas() {
        let store = InMemoryStore::new();
        assert!(store.counter_compare_and_set("team_id", None, "1").await.unwrap());
        assert!(!store.counter_compare_and_set("team_id", None, "1").await.unwrap());
        assert!(store.counter_compare_and_set("team_id", Some("1"), "2").await.unwrap());
        assert_eq!(store.counter_get("team_id").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_filter_pagination() {
        let store = InMemoryStore::new();
        for _ in 0..25 {
            store.registration_insert(&registration(None)).await.unwrap();
        }
        let filter = RegistrationFilter::default();
        let (items, total) = store
            .registration_filter(&filter, PageRequest::new(Some(3), Some(10)))
            .await
            .unwrap();
        assert_eq!(total, 25);
        assert_eq!(items.len(), 5);
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);
        let err = store.ping().await.unwrap_err();
        assert_eq!(err.kind(), sprint_core::ErrorKind::Unavailable);
    }
}
