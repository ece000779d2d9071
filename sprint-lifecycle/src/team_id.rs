//! Sequential team id allocation.
//!
//! Ids come from a named decimal counter in the store that only moves via
//! compare-and-set, so two registrations confirmed at the same time can
//! never draw the same number. The counter is seeded once from the largest
//! id already issued. A per-registration lock plus the store's set-if-absent
//! keeps a registration from ever drawing twice.
//!
//! A number is drawn before it is stored on the registration. If storing it
//! fails, the number is not returned to the counter and the sequence has a
//! gap there. Such gaps are logged at `warn` with the drawn id.

use std::sync::Arc;

use sprint_core::{
    increment_decimal, EntityKind, RegistrationId, SprintError, SprintResult, StateError,
    StorageError,
};
use sprint_storage::{AsyncStore, CacheKey, ReadThroughCache};

use crate::locks::KeyedLocks;

/// Name of the store counter holding the last issued team id.
pub const TEAM_ID_COUNTER: &str = "team_id";

const MAX_COUNTER_ATTEMPTS: usize = 128;

#[derive(Clone)]
pub struct TeamIdAllocator {
    store: Arc<dyn AsyncStore>,
    cache: ReadThroughCache,
    locks: KeyedLocks<RegistrationId>,
}

impl TeamIdAllocator {
    /// `locks` is the registration lock map shared with the payment machine
    /// and the registration desk.
    pub fn new(
        store: Arc<dyn AsyncStore>,
        cache: ReadThroughCache,
        locks: KeyedLocks<RegistrationId>,
    ) -> Self {
        Self {
            store,
            cache,
            locks,
        }
    }

    /// Give the registration a team id unless it already has one. Returns the
    /// id the registration holds afterwards.
    pub async fn assign(&self, registration_id: RegistrationId) -> SprintResult<String> {
        let _guard = self.locks.lock(registration_id).await;

        let registration = self
            .store
            .registration_get(registration_id)
            .await?
            .ok_or_else(|| SprintError::not_found(EntityKind::Registration, registration_id))?;
        if let Some(existing) = registration.team_id {
            return Ok(existing);
        }

        let drawn = self.next_id().await?;
        let stored = match self
            .store
            .registration_set_team_id_if_absent(registration_id, &drawn)
            .await
        {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                tracing::warn!(
                    registration_id = %registration_id,
                    drawn = %drawn,
                    "Registration removed after drawing a team id, number skipped"
                );
                return Err(SprintError::not_found(EntityKind::Registration, registration_id));
            }
            Err(e) => {
                tracing::warn!(
                    registration_id = %registration_id,
                    drawn = %drawn,
                    error = %e,
                    "Failed to store drawn team id, number skipped"
                );
                return Err(e);
            }
        };
        self.cache
            .invalidate(&CacheKey::registration(registration_id))
            .await;

        let assigned = stored.team_id.ok_or_else(|| StorageError::QueryFailed {
            entity: EntityKind::Registration,
            reason: format!("team id not stored for {}", registration_id),
        })?;
        if assigned != drawn {
            // Another process assigned first; the drawn number is skipped.
            tracing::warn!(
                registration_id = %registration_id,
                drawn = %drawn,
                assigned = %assigned,
                "Team id already assigned elsewhere"
            );
        } else {
            tracing::info!(registration_id = %registration_id, team_id = %assigned, "Team id assigned");
        }
        Ok(assigned)
    }

    /// Draw the next id from the counter.
    async fn next_id(&self) -> SprintResult<String> {
        for _ in 0..MAX_COUNTER_ATTEMPTS {
            let Some(current) = self.store.counter_get(TEAM_ID_COUNTER).await? else {
                self.seed_counter().await?;
                continue;
            };

            let next = increment_decimal(&current)?;
            if self
                .store
                .counter_compare_and_set(TEAM_ID_COUNTER, Some(&current), &next)
                .await?
            {
                return Ok(next);
            }
            tokio::task::yield_now().await;
        }

        Err(StateError::ConcurrentModification {
            entity: EntityKind::Registration,
            id: TEAM_ID_COUNTER.to_string(),
        }
        .into())
    }

    /// Create the counter at the largest issued id, or `0`. Losing the race
    /// to another seeder is fine.
    async fn seed_counter(&self) -> SprintResult<()> {
        let seed = self
            .store
            .registration_max_team_id()
            .await?
            .unwrap_or_else(|| "0".to_string());
        let created = self
            .store
            .counter_compare_and_set(TEAM_ID_COUNTER, None, &seed)
            .await?;
        if created {
            tracing::info!(counter = TEAM_ID_COUNTER, seed = %seed, "Counter seeded");
        }
        Ok(())
    }
}
