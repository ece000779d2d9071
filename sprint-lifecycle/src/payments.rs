//! Payment / Registration State Machine
//!
//! A payment moves `Pending -> Completed | Failed` and `Completed -> Refunded`.
//! Transitions on one payment id are serialized with a keyed lock and land in
//! the store as a compare-and-set on the status. The registration's embedded
//! snapshot is written only after the payment commit, under the registration
//! lock; if that second write fails the transition still succeeds and the
//! registration is repaired on its next read.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sprint_core::{
    EntityKind, PaymentId, PaymentMethod, PaymentRecord, PaymentStatus, RegistrationId,
    SprintError, SprintResult, StateError,
};
use sprint_storage::{AsyncStore, CacheKey, ReadThroughCache};

use crate::fetchers::PaymentFetcher;
use crate::locks::KeyedLocks;
use crate::team_id::TeamIdAllocator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewPayment {
    pub registration_id: RegistrationId,
    pub amount: u64,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TransitionOutcome {
    pub payment: PaymentRecord,
    /// False if the registration snapshot could not be updated. Read-repair
    /// reconciles it.
    pub snapshot_synced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CallbackOutcome {
    pub payment: PaymentRecord,
    /// Set once the payment is `Completed`.
    pub team_id: Option<String>,
    pub snapshot_synced: bool,
}

#[derive(Clone)]
pub struct PaymentMachine {
    store: Arc<dyn AsyncStore>,
    cache: ReadThroughCache,
    team_ids: TeamIdAllocator,
    registration_locks: KeyedLocks<RegistrationId>,
    payment_locks: KeyedLocks<PaymentId>,
}

impl PaymentMachine {
    pub fn new(
        store: Arc<dyn AsyncStore>,
        cache: ReadThroughCache,
        team_ids: TeamIdAllocator,
        registration_locks: KeyedLocks<RegistrationId>,
    ) -> Self {
        Self {
            store,
            cache,
            team_ids,
            registration_locks,
            payment_locks: KeyedLocks::new(),
        }
    }

    // ========================================================================
    // CREATE
    // ========================================================================

    /// Start a payment attempt. Allowed only when the registration has no
    /// payment yet or its latest attempt failed.
    pub async fn create_payment(&self, new: NewPayment) -> SprintResult<PaymentRecord> {
        if new.amount == 0 {
            return Err(SprintError::invalid_value("amount", "must be greater than zero"));
        }

        let registration_id = new.registration_id;
        let _guard = self.registration_locks.lock(registration_id).await;

        let registration = self
            .store
            .registration_get(registration_id)
            .await?
            .filter(|r| !r.is_deleted)
            .ok_or_else(|| SprintError::not_found(EntityKind::Registration, registration_id))?;

        // The payment table wins over a snapshot that may be lagging.
        let latest = self
            .store
            .payments_for_registration(registration_id)
            .await?
            .last()
            .map(|p| p.status);
        let current = latest.or(registration.payment_status());

        let id = registration_id.to_string();
        match current {
            Some(PaymentStatus::Completed) => {
                return Err(StateError::AlreadyPaid { registration_id: id }.into())
            }
            Some(PaymentStatus::Refunded) => {
                return Err(StateError::AlreadyRefunded { registration_id: id }.into())
            }
            Some(PaymentStatus::Pending) => {
                return Err(StateError::PaymentInProgress { registration_id: id }.into())
            }
            Some(PaymentStatus::Failed) | None => {}
        }

        let payment = PaymentRecord::pending(registration_id, new.amount, new.method, Utc::now());
        self.store.payment_insert(&payment).await?;
        self.sync_snapshot(&payment).await;

        tracing::info!(
            payment_id = %payment.payment_id,
            registration_id = %registration_id,
            amount = payment.amount,
            "Payment created"
        );
        Ok(payment)
    }

    // ========================================================================
    // TRANSITIONS
    // ========================================================================

    /// Transition by textual id. A malformed id fails before any side effect.
    pub async fn transition(
        &self,
        raw_id: &str,
        new_status: PaymentStatus,
    ) -> SprintResult<TransitionOutcome> {
        let id = PaymentId::parse(raw_id)?;
        self.transition_by_id(id, new_status).await
    }

    pub async fn transition_by_id(
        &self,
        id: PaymentId,
        new_status: PaymentStatus,
    ) -> SprintResult<TransitionOutcome> {
        let _guard = self.payment_locks.lock(id).await;

        let current = self
            .store
            .payment_get(id)
            .await?
            .ok_or_else(|| SprintError::not_found(EntityKind::Payment, id))?;

        if !current.status.can_transition_to(new_status) {
            return Err(StateError::InvalidTransition {
                from: current.status,
                to: new_status,
            }
            .into());
        }

        let updated = self
            .store
            .payment_update_status(id, current.status, new_status)
            .await?
            .ok_or_else(|| StateError::ConcurrentModification {
                entity: EntityKind::Payment,
                id: id.to_string(),
            })?;
        self.cache.invalidate(&CacheKey::payment(id)).await;

        let snapshot_synced = {
            let _reg_guard = self.registration_locks.lock(updated.registration_id).await;
            self.sync_snapshot(&updated).await
        };

        tracing::info!(
            payment_id = %id,
            from = %current.status,
            to = %new_status,
            snapshot_synced,
            "Payment transitioned"
        );
        Ok(TransitionOutcome {
            payment: updated,
            snapshot_synced,
        })
    }

    /// External confirmation for a payment. Repeating a callback with the
    /// status the payment already has changes nothing. On `Completed` the
    /// registration gets its team id, once.
    pub async fn payment_callback(
        &self,
        registration_id: RegistrationId,
        payment_id: PaymentId,
        status: PaymentStatus,
    ) -> SprintResult<CallbackOutcome> {
        let payment = self
            .store
            .payment_get(payment_id)
            .await?
            .ok_or_else(|| SprintError::not_found(EntityKind::Payment, payment_id))?;
        if payment.registration_id != registration_id {
            return Err(StateError::PaymentMismatch {
                payment_id: payment_id.to_string(),
                registration_id: registration_id.to_string(),
            }
            .into());
        }

        let (payment, snapshot_synced) = if payment.status == status {
            tracing::debug!(payment_id = %payment_id, status = %status, "Duplicate payment callback");
            (payment, true)
        } else {
            match self.transition_by_id(payment_id, status).await {
                Ok(outcome) => (outcome.payment, outcome.snapshot_synced),
                // A concurrent duplicate of this callback got there first.
                Err(SprintError::State(StateError::InvalidTransition { from, .. }))
                    if from == status =>
                {
                    let current = self
                        .store
                        .payment_get(payment_id)
                        .await?
                        .ok_or_else(|| SprintError::not_found(EntityKind::Payment, payment_id))?;
                    (current, true)
                }
                Err(e) => return Err(e),
            }
        };

        let team_id = if payment.status == PaymentStatus::Completed {
            Some(self.team_ids.assign(registration_id).await?)
        } else {
            None
        };

        Ok(CallbackOutcome {
            payment,
            team_id,
            snapshot_synced,
        })
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub async fn get_payment(&self, id: PaymentId) -> SprintResult<PaymentRecord> {
        let fetcher = PaymentFetcher {
            store: Arc::clone(&self.store),
            id,
        };
        self.cache
            .get_or_fetch(&CacheKey::payment(id), &fetcher)
            .await?
            .map(|read| read.into_value())
            .ok_or_else(|| SprintError::not_found(EntityKind::Payment, id))
    }

    /// Mirror `payment` into its registration. The caller holds the
    /// registration lock. Failures are logged and reported as `false`.
    async fn sync_snapshot(&self, payment: &PaymentRecord) -> bool {
        let registration_id = payment.registration_id;
        let synced = match self
            .store
            .registration_set_payment(registration_id, payment.snapshot())
            .await
        {
            Ok(Some(_)) => true,
            Ok(None) => {
                tracing::warn!(
                    payment_id = %payment.payment_id,
                    registration_id = %registration_id,
                    "Registration missing while syncing payment snapshot"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    payment_id = %payment.payment_id,
                    registration_id = %registration_id,
                    error = %e,
                    "Failed to sync payment snapshot, leaving it to read-repair"
                );
                false
            }
        };
        // Even on failure, so the next read goes through read-repair.
        self.cache
            .invalidate(&CacheKey::registration(registration_id))
            .await;
        synced
    }
}
