//! Wiring of the domain components over one set of collaborators.

use std::sync::Arc;

use sprint_core::{EntityKind, RegistrationId};
use sprint_storage::{AsyncStore, CacheKey, ObjectStore, ReadThroughCache};

use crate::events::EventCatalog;
use crate::files::{FileLifecycle, SweepPolicy};
use crate::gallery::Gallery;
use crate::locks::KeyedLocks;
use crate::mail::MailSender;
use crate::payments::PaymentMachine;
use crate::registrations::RegistrationDesk;
use crate::team_id::TeamIdAllocator;

/// Every component, sharing one store, one cache and one registration lock
/// map.
#[derive(Clone)]
pub struct Services {
    pub files: FileLifecycle,
    pub events: EventCatalog,
    pub gallery: Gallery,
    pub registrations: RegistrationDesk,
    pub payments: PaymentMachine,
    pub team_ids: TeamIdAllocator,
    store: Arc<dyn AsyncStore>,
    cache: ReadThroughCache,
}

impl Services {
    pub fn new(
        store: Arc<dyn AsyncStore>,
        objects: Arc<dyn ObjectStore>,
        cache: ReadThroughCache,
        mailer: Arc<dyn MailSender>,
        policy: SweepPolicy,
    ) -> Self {
        let registration_locks: KeyedLocks<RegistrationId> = KeyedLocks::new();

        let files = FileLifecycle::new(Arc::clone(&store), objects, cache.clone(), policy);
        let events = EventCatalog::new(Arc::clone(&store), cache.clone(), files.clone());
        let gallery = Gallery::new(Arc::clone(&store), cache.clone(), files.clone());
        let team_ids = TeamIdAllocator::new(
            Arc::clone(&store),
            cache.clone(),
            registration_locks.clone(),
        );
        let payments = PaymentMachine::new(
            Arc::clone(&store),
            cache.clone(),
            team_ids.clone(),
            registration_locks.clone(),
        );
        let registrations =
            RegistrationDesk::new(Arc::clone(&store), cache.clone(), mailer, registration_locks);

        Self {
            files,
            events,
            gallery,
            registrations,
            payments,
            team_ids,
            store,
            cache,
        }
    }

    pub fn store(&self) -> &Arc<dyn AsyncStore> {
        &self.store
    }

    pub fn cache(&self) -> &ReadThroughCache {
        &self.cache
    }

    /// Drop every cached entry of one entity kind.
    pub async fn flush_cache(&self, kind: EntityKind) -> u64 {
        let removed = self
            .cache
            .invalidate_prefix(&CacheKey::kind_prefix(kind))
            .await;
        tracing::info!(kind = %kind, removed, "Cache flushed");
        removed
    }
}
