//! Registration desk: team sign-up, lookup with read-repair, and filtered
//! listing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sprint_core::{
    EntityKind, EventId, Page, PageRequest, PaymentSnapshot, RegistrationFilter, RegistrationId,
    RegistrationRecord, SprintError, SprintResult, StateError, TeamMember,
};
use sprint_storage::{AsyncStore, CacheKey, ReadThroughCache, StorageFetcher};

use crate::locks::KeyedLocks;
use crate::mail::{Mail, MailSender};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewRegistration {
    pub team_name: String,
    pub team: Vec<TeamMember>,
    pub event_ids: Vec<EventId>,
    pub amount: u64,
}

impl NewRegistration {
    fn validate(&self) -> SprintResult<()> {
        if self.team_name.trim().is_empty() {
            return Err(SprintError::missing_field("team_name"));
        }
        if self.team.is_empty() {
            return Err(SprintError::missing_field("team"));
        }
        for (i, member) in self.team.iter().enumerate() {
            if member.name.trim().is_empty() {
                return Err(SprintError::missing_field(&format!("team[{}].name", i)));
            }
            if !member.email.contains('@') {
                return Err(SprintError::invalid_value(
                    &format!("team[{}].email", i),
                    "not an email address",
                ));
            }
        }
        if self.event_ids.is_empty() {
            return Err(SprintError::missing_field("event_ids"));
        }
        Ok(())
    }
}

/// Loads a registration and reconciles its payment snapshot with the
/// newest payment on record.
struct RegistrationFetcher {
    store: Arc<dyn AsyncStore>,
    cache: ReadThroughCache,
    locks: KeyedLocks<RegistrationId>,
    id: RegistrationId,
}

impl RegistrationFetcher {
    /// The live registration and the snapshot of its newest payment.
    async fn load(&self) -> SprintResult<Option<(RegistrationRecord, Option<PaymentSnapshot>)>> {
        let Some(registration) = self
            .store
            .registration_get(self.id)
            .await?
            .filter(|r| !r.is_deleted)
        else {
            return Ok(None);
        };
        let latest = self
            .store
            .payments_for_registration(self.id)
            .await?
            .last()
            .map(|p| p.snapshot());
        Ok(Some((registration, latest)))
    }

    async fn repair(&self) -> SprintResult<Option<RegistrationRecord>> {
        let _guard = self.locks.lock(self.id).await;
        // Re-read under the lock; a transition may have synced meanwhile.
        let Some((mut registration, latest)) = self.load().await? else {
            return Ok(None);
        };
        let Some(latest) = latest.filter(|l| registration.payment != Some(*l)) else {
            return Ok(Some(registration));
        };

        tracing::info!(
            registration_id = %self.id,
            payment_id = %latest.payment_id,
            status = %latest.status,
            "Repairing registration payment snapshot"
        );
        match self.store.registration_set_payment(self.id, latest).await {
            Ok(Some(repaired)) => registration = repaired,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(registration_id = %self.id, error = %e, "Read-repair write failed");
                registration.payment = Some(latest);
            }
        }
        self.cache
            .invalidate(&CacheKey::registration(self.id))
            .await;
        Ok(Some(registration))
    }
}

#[async_trait]
impl StorageFetcher<RegistrationRecord> for RegistrationFetcher {
    async fn fetch(&self) -> SprintResult<Option<RegistrationRecord>> {
        match self.load().await? {
            None => Ok(None),
            Some((registration, latest)) if latest.is_none() || latest == registration.payment => {
                Ok(Some(registration))
            }
            Some(_) => self.repair().await,
        }
    }
}

#[derive(Clone)]
pub struct RegistrationDesk {
    store: Arc<dyn AsyncStore>,
    cache: ReadThroughCache,
    mailer: Arc<dyn MailSender>,
    locks: KeyedLocks<RegistrationId>,
}

impl RegistrationDesk {
    pub fn new(
        store: Arc<dyn AsyncStore>,
        cache: ReadThroughCache,
        mailer: Arc<dyn MailSender>,
        locks: KeyedLocks<RegistrationId>,
    ) -> Self {
        Self {
            store,
            cache,
            mailer,
            locks,
        }
    }

    /// Store a registration for live events and send the confirmation mail
    /// in the background.
    pub async fn create(&self, new: NewRegistration) -> SprintResult<RegistrationRecord> {
        new.validate()?;

        let team_size = new.team.len() as u32;
        for &event_id in &new.event_ids {
            let event = self
                .store
                .event_get(event_id)
                .await?
                .filter(|e| !e.is_deleted)
                .ok_or_else(|| SprintError::not_found(EntityKind::Event, event_id))?;
            let bounds = event.participants;
            if team_size < bounds.min || team_size > bounds.max {
                return Err(SprintError::invalid_value(
                    "team",
                    format!(
                        "{} allows teams of {} to {}, got {}",
                        event.name, bounds.min, bounds.max, team_size
                    ),
                ));
            }
        }

        let now = Utc::now();
        let registration = RegistrationRecord {
            registration_id: RegistrationId::new(),
            team_name: new.team_name.trim().to_string(),
            team: new.team,
            event_ids: new.event_ids,
            amount: new.amount,
            payment: None,
            team_id: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.store.registration_insert(&registration).await?;

        tracing::info!(
            registration_id = %registration.registration_id,
            team_name = %registration.team_name,
            "Registration created"
        );
        self.dispatch_confirmation(&registration);
        Ok(registration)
    }

    fn dispatch_confirmation(&self, registration: &RegistrationRecord) {
        let Some(mail) = Mail::registration_confirmation(registration) else {
            tracing::warn!(
                registration_id = %registration.registration_id,
                "No contact address, skipping confirmation mail"
            );
            return;
        };
        let mailer = Arc::clone(&self.mailer);
        let registration_id = registration.registration_id;
        tokio::spawn(async move {
            let to = mail.to.clone();
            match mailer.send(mail).await {
                Ok(()) => tracing::debug!(registration_id = %registration_id, to = %to, "Confirmation mail sent"),
                Err(e) => tracing::warn!(
                    registration_id = %registration_id,
                    to = %to,
                    error = %e,
                    "Confirmation mail failed"
                ),
            }
        });
    }

    pub async fn get(&self, id: RegistrationId) -> SprintResult<RegistrationRecord> {
        let fetcher = RegistrationFetcher {
            store: Arc::clone(&self.store),
            cache: self.cache.clone(),
            locks: self.locks.clone(),
            id,
        };
        self.cache
            .get_or_fetch(&CacheKey::registration(id), &fetcher)
            .await?
            .map(|read| read.into_value())
            .ok_or_else(|| SprintError::not_found(EntityKind::Registration, id))
    }

    /// One page of matching registrations, newest first.
    pub async fn filter(
        &self,
        filter: &RegistrationFilter,
        page: PageRequest,
    ) -> SprintResult<Page<RegistrationRecord>> {
        let (items, total) = self.store.registration_filter(filter, page).await?;
        let total_pages = page.total_pages(total);
        if total_pages > 0 && u64::from(page.page) > total_pages {
            return Err(StateError::PageOutOfRange {
                page: page.page,
                total_pages,
            }
            .into());
        }
        Ok(Page {
            items,
            total,
            total_pages,
            current_page: page.page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::LogMailer;
    use sprint_core::{
        ErrorKind, EventRecord, Location, Participants, PaymentRecord, PaymentMethod,
        PaymentStatus, RegistrationCharge, Shift,
    };
    use sprint_storage::{CacheConfig, InMemoryStore, MemoryCacheBackend};

    fn desk(store: Arc<InMemoryStore>) -> RegistrationDesk {
        let cache = ReadThroughCache::new(Arc::new(MemoryCacheBackend::new()), CacheConfig::default());
        RegistrationDesk::new(store, cache, Arc::new(LogMailer), KeyedLocks::new())
    }

    async fn event(store: &InMemoryStore) -> EventId {
        let now = Utc::now();
        let event = EventRecord {
            event_id: EventId::new(),
            name: "Hackathon".to_string(),
            event_type: "Technical".to_string(),
            description: String::new(),
            organiser: String::new(),
            location: Location::default(),
            event_date: now,
            shift: Shift::Evening,
            photos: vec![],
            rule_book: None,
            registration_charge: RegistrationCharge::default(),
            participants: Participants::default(),
            uploaded_by: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        store.event_insert(&event).await.unwrap();
        event.event_id
    }

    fn member(name: &str) -> TeamMember {
        TeamMember {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: "9000000000".to_string(),
            college: Some("NIT".to_string()),
        }
    }

    fn new_registration(team_name: &str, event_id: EventId) -> NewRegistration {
        NewRegistration {
            team_name: team_name.to_string(),
            team: vec![member("Ana"), member("Bo")],
            event_ids: vec![event_id],
            amount: 400,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = Arc::new(InMemoryStore::new());
        let event_id = event(&store).await;
        let desk = desk(store.clone());

        let created = desk.create(new_registration("Alpha", event_id)).await.unwrap();
        assert_eq!(desk.get(created.registration_id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let store = Arc::new(InMemoryStore::new());
        let event_id = event(&store).await;
        let desk = desk(store.clone());

        let mut empty = new_registration("Alpha", event_id);
        empty.team.clear();
        assert_eq!(
            desk.create(empty).await.unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );

        let mut solo = new_registration("Alpha", event_id);
        solo.team.truncate(1);
        assert_eq!(
            desk.create(solo).await.unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );

        let unknown = new_registration("Alpha", EventId::new());
        assert_eq!(
            desk.create(unknown).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_read_repair_fixes_lagging_snapshot() {
        let store = Arc::new(InMemoryStore::new());
        let event_id = event(&store).await;
        let desk = desk(store.clone());
        let created = desk.create(new_registration("Alpha", event_id)).await.unwrap();

        // A payment committed without its snapshot sync.
        let mut payment = PaymentRecord::pending(
            created.registration_id,
            400,
            PaymentMethod::CreditCard,
            Utc::now(),
        );
        payment.status = PaymentStatus::Completed;
        store.payment_insert(&payment).await.unwrap();

        let read = desk.get(created.registration_id).await.unwrap();
        assert_eq!(read.payment, Some(payment.snapshot()));
        let stored = store
            .registration_get(created.registration_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.payment, Some(payment.snapshot()));
    }

    #[tokio::test]
    async fn test_filter_pages() {
        let store = Arc::new(InMemoryStore::new());
        let event_id = event(&store).await;
        let desk = desk(store.clone());
        for i in 0..3 {
            desk.create(new_registration(&format!("Robo {}", i), event_id))
                .await
                .unwrap();
        }
        desk.create(new_registration("Coders", event_id)).await.unwrap();

        let filter = RegistrationFilter {
            team_name: Some("robo".to_string()),
            ..Default::default()
        };
        let page = desk
            .filter(&filter, PageRequest::new(Some(2), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.current_page, 2);

        let err = desk
            .filter(&filter, PageRequest::new(Some(3), Some(2)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // An empty result is a valid first page.
        let none = RegistrationFilter {
            team_name: Some("nobody".to_string()),
            ..Default::default()
        };
        let page = desk.filter(&none, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
    }
}
