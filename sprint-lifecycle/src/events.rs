//! Event catalog.
//!
//! Events own photo and rule-book files. Every change to an event's file
//! references is applied under a per-event lock against a freshly reloaded
//! record, so the detach set is computed from what is actually stored.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sprint_core::{
    EntityKind, EventId, EventRecord, FileId, Location, Participants, RegistrationCharge, Shift,
    SprintError, SprintResult, Timestamp, UsageTag, UserId,
};
use sprint_storage::{AsyncStore, CacheKey, ReadThroughCache};

use crate::fetchers::{EventFetcher, EventListFetcher};
use crate::files::FileLifecycle;
use crate::locks::KeyedLocks;

/// Fields accepted when creating an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewEvent {
    pub name: String,
    pub event_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub organiser: String,
    #[serde(default)]
    pub location: Location,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub event_date: Timestamp,
    pub shift: Shift,
    #[serde(default)]
    pub photos: Vec<FileId>,
    #[serde(default)]
    pub rule_book: Option<FileId>,
    #[serde(default)]
    pub registration_charge: RegistrationCharge,
    #[serde(default)]
    pub participants: Participants,
    #[serde(default)]
    pub uploaded_by: Option<UserId>,
}

impl NewEvent {
    fn validate(&self) -> SprintResult<()> {
        if self.name.trim().is_empty() {
            return Err(SprintError::missing_field("name"));
        }
        if self.event_type.trim().is_empty() {
            return Err(SprintError::missing_field("event_type"));
        }
        if self.participants.min == 0 || self.participants.min > self.participants.max {
            return Err(SprintError::invalid_value(
                "participants",
                format!(
                    "min {} must be at least 1 and not above max {}",
                    self.participants.min, self.participants.max
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct EventCatalog {
    store: Arc<dyn AsyncStore>,
    cache: ReadThroughCache,
    files: FileLifecycle,
    locks: KeyedLocks<EventId>,
}

impl EventCatalog {
    pub fn new(store: Arc<dyn AsyncStore>, cache: ReadThroughCache, files: FileLifecycle) -> Self {
        Self {
            store,
            cache,
            files,
            locks: KeyedLocks::new(),
        }
    }

    pub async fn create(&self, new: NewEvent) -> SprintResult<EventRecord> {
        new.validate()?;

        let now = Utc::now();
        let event = EventRecord {
            event_id: EventId::new(),
            name: new.name.trim().to_string(),
            event_type: new.event_type.trim().to_string(),
            description: new.description,
            organiser: new.organiser,
            location: new.location,
            event_date: new.event_date,
            shift: new.shift,
            photos: dedup(new.photos),
            rule_book: new.rule_book,
            registration_charge: new.registration_charge,
            participants: new.participants,
            uploaded_by: new.uploaded_by,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };

        self.store.event_insert(&event).await?;
        self.cache.invalidate(&CacheKey::events()).await;

        self.files
            .reassign(&[], &event.photos, UsageTag::EventPhotos)
            .await;
        if let Some(rule_book) = event.rule_book {
            self.files
                .reassign(&[], &[rule_book], UsageTag::RuleBook)
                .await;
        }

        tracing::info!(event_id = %event.event_id, name = %event.name, "Event created");
        Ok(event)
    }

    pub async fn get(&self, id: EventId) -> SprintResult<EventRecord> {
        let fetcher = EventFetcher {
            store: Arc::clone(&self.store),
            id,
        };
        self.cache
            .get_or_fetch(&CacheKey::event(id), &fetcher)
            .await?
            .map(|read| read.into_value())
            .ok_or_else(|| SprintError::not_found(EntityKind::Event, id))
    }

    /// Live events ordered by event date.
    pub async fn list(&self) -> SprintResult<Vec<EventRecord>> {
        let fetcher = EventListFetcher {
            store: Arc::clone(&self.store),
        };
        Ok(self
            .cache
            .get_or_fetch(&CacheKey::events(), &fetcher)
            .await?
            .map(|read| read.into_value())
            .unwrap_or_default())
    }

    /// Replace the photo set. Photos no longer referenced are detached before
    /// the new ones are attached.
    ///
    /// The event write is what this reports on. File retention updates run
    /// after the cache keys are invalidated and only log their failures.
    pub async fn replace_photos(
        &self,
        id: EventId,
        photos: Vec<FileId>,
    ) -> SprintResult<EventRecord> {
        let photos = dedup(photos);
        let _guard = self.locks.lock(id).await;
        let mut event = self.load_live(id).await?;

        let removed: Vec<FileId> = event
            .photos
            .iter()
            .filter(|p| !photos.contains(p))
            .copied()
            .collect();
        let added: Vec<FileId> = photos
            .iter()
            .filter(|p| !event.photos.contains(p))
            .copied()
            .collect();

        event.photos = photos;
        event.updated_at = Utc::now();
        self.store.event_update(&event).await?;
        self.invalidate_event(id).await;

        self.files
            .reassign(&removed, &added, UsageTag::EventPhotos)
            .await;

        tracing::info!(
            event_id = %id,
            removed = removed.len(),
            added = added.len(),
            "Event photos replaced"
        );
        Ok(event)
    }

    /// Set or clear the rule book.
    pub async fn set_rule_book(
        &self,
        id: EventId,
        rule_book: Option<FileId>,
    ) -> SprintResult<EventRecord> {
        let _guard = self.locks.lock(id).await;
        let mut event = self.load_live(id).await?;

        let previous = event.rule_book;
        event.rule_book = rule_book;
        event.updated_at = Utc::now();
        self.store.event_update(&event).await?;
        self.invalidate_event(id).await;

        if previous != rule_book {
            let released: Vec<FileId> = previous.into_iter().collect();
            let claimed: Vec<FileId> = rule_book.into_iter().collect();
            self.files
                .reassign(&released, &claimed, UsageTag::RuleBook)
                .await;
        }

        tracing::info!(event_id = %id, "Event rule book updated");
        Ok(event)
    }

    /// Soft delete. The event's files are released.
    pub async fn delete(&self, id: EventId) -> SprintResult<EventRecord> {
        let _guard = self.locks.lock(id).await;
        let mut event = self.load_live(id).await?;

        event.is_deleted = true;
        event.updated_at = Utc::now();
        self.store.event_update(&event).await?;
        self.invalidate_event(id).await;

        self.files
            .reassign(&event.file_ids(), &[], UsageTag::Unassigned)
            .await;

        tracing::info!(event_id = %id, "Event deleted");
        Ok(event)
    }

    async fn load_live(&self, id: EventId) -> SprintResult<EventRecord> {
        self.store
            .event_get(id)
            .await?
            .filter(|e| !e.is_deleted)
            .ok_or_else(|| SprintError::not_found(EntityKind::Event, id))
    }

    async fn invalidate_event(&self, id: EventId) {
        self.cache
            .invalidate_all(&[CacheKey::event(id), CacheKey::events()])
            .await;
    }
}

fn dedup(ids: Vec<FileId>) -> Vec<FileId> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
