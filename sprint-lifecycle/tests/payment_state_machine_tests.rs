//! Payment monotonicity and team id uniqueness.

use std::collections::BTreeSet;

use proptest::prelude::*;
use sprint_core::{ErrorKind, PaymentStatus, RegistrationId, SprintError, StateError};
use sprint_storage::AsyncStore;
use sprint_test_utils::{fixtures, generators::arb_status_requests, Harness};

async fn registered(h: &Harness) -> RegistrationId {
    let event = h.event(vec![]).await.unwrap();
    h.registration(vec![event.event_id])
        .await
        .unwrap()
        .registration_id
}

#[tokio::test]
async fn test_completed_never_returns_to_pending() {
    let h = Harness::new();
    let reg = registered(&h).await;
    let payment = h.pending_payment(reg).await.unwrap();
    let machine = &h.services.payments;

    machine
        .transition(&payment.payment_id.to_string(), PaymentStatus::Completed)
        .await
        .unwrap();
    let err = machine
        .transition(&payment.payment_id.to_string(), PaymentStatus::Pending)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(matches!(
        err,
        SprintError::State(StateError::InvalidTransition {
            from: PaymentStatus::Completed,
            to: PaymentStatus::Pending
        })
    ));

    let stored = h.store.payment_get(payment.payment_id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn test_refunded_and_failed_are_terminal() {
    let h = Harness::new();
    let reg = registered(&h).await;
    let machine = &h.services.payments;

    let first = h.pending_payment(reg).await.unwrap();
    machine
        .transition_by_id(first.payment_id, PaymentStatus::Failed)
        .await
        .unwrap();
    for next in PaymentStatus::ALL {
        assert!(machine
            .transition_by_id(first.payment_id, next)
            .await
            .is_err());
    }

    let second = h.pending_payment(reg).await.unwrap();
    machine
        .transition_by_id(second.payment_id, PaymentStatus::Completed)
        .await
        .unwrap();
    machine
        .transition_by_id(second.payment_id, PaymentStatus::Refunded)
        .await
        .unwrap();
    for next in PaymentStatus::ALL {
        assert!(machine
            .transition_by_id(second.payment_id, next)
            .await
            .is_err());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_transitions_on_one_payment() {
    let h = Harness::new();
    let reg = registered(&h).await;
    let payment = h.pending_payment(reg).await.unwrap();

    let completed = h.services.payments.clone();
    let failed = h.services.payments.clone();
    let id = payment.payment_id;
    let (a, b) = tokio::join!(
        tokio::spawn(async move { completed.transition_by_id(id, PaymentStatus::Completed).await }),
        tokio::spawn(async move { failed.transition_by_id(id, PaymentStatus::Failed).await })
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    // Exactly one wins; the loser sees a terminal state.
    assert!(a.is_ok() ^ b.is_ok());
    let stored = h.store.payment_get(id).await.unwrap().unwrap();
    let registration = h.services.registrations.get(reg).await.unwrap();
    assert_eq!(registration.payment, Some(stored.snapshot()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_fifty_concurrent_callbacks_get_sequential_team_ids() {
    let h = Harness::new();
    let event = h.event(vec![]).await.unwrap();

    // Some ids were issued before this run.
    let earlier = h.registration(vec![event.event_id]).await.unwrap();
    let earlier_payment = h.pending_payment(earlier.registration_id).await.unwrap();
    let first = h
        .services
        .payments
        .payment_callback(
            earlier.registration_id,
            earlier_payment.payment_id,
            PaymentStatus::Completed,
        )
        .await
        .unwrap()
        .team_id
        .unwrap();
    let k: u64 = first.parse::<u64>().unwrap() + 1;

    let mut pending = Vec::new();
    for i in 0..50 {
        let reg = h
            .services
            .registrations
            .create(fixtures::new_registration(&format!("Team {}", i), vec![event.event_id]))
            .await
            .unwrap();
        let payment = h.pending_payment(reg.registration_id).await.unwrap();
        pending.push((reg.registration_id, payment.payment_id));
    }

    let mut handles = Vec::new();
    for (reg, pay) in pending.clone() {
        let payments = h.services.payments.clone();
        handles.push(tokio::spawn(async move {
            payments
                .payment_callback(reg, pay, PaymentStatus::Completed)
                .await
        }));
    }

    let mut ids = BTreeSet::new();
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        let team_id: u64 = outcome.team_id.unwrap().parse().unwrap();
        assert!(ids.insert(team_id), "duplicate team id {}", team_id);
    }
    let expected: BTreeSet<u64> = (k..k + 50).collect();
    assert_eq!(ids, expected);

    // Stored ids match what the callbacks reported.
    for (reg, _) in pending {
        let stored = h.store.registration_get(reg).await.unwrap().unwrap();
        let team_id: u64 = stored.team_id.unwrap().parse().unwrap();
        assert!(expected.contains(&team_id));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_callbacks_draw_one_id() {
    let h = Harness::new();
    let reg = registered(&h).await;
    let payment = h.pending_payment(reg).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let payments = h.services.payments.clone();
        let pay = payment.payment_id;
        handles.push(tokio::spawn(async move {
            payments
                .payment_callback(reg, pay, PaymentStatus::Completed)
                .await
        }));
    }
    let mut ids = BTreeSet::new();
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        ids.insert(outcome.team_id.unwrap());
    }
    assert_eq!(ids.len(), 1);
    assert_eq!(
        h.store
            .counter_get(sprint_lifecycle::TEAM_ID_COUNTER)
            .await
            .unwrap()
            .as_deref(),
        Some("1")
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever transitions are requested, the statuses a payment passes
    /// through form a path in the transition table.
    #[test]
    fn prop_observed_statuses_follow_the_table(requests in arb_status_requests(8)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let h = Harness::new();
            let reg = registered(&h).await;
            let payment = h.pending_payment(reg).await.unwrap();

            let mut observed = vec![PaymentStatus::Pending];
            for next in requests {
                let before = *observed.last().unwrap();
                match h.services.payments.transition_by_id(payment.payment_id, next).await {
                    Ok(outcome) => {
                        prop_assert!(before.can_transition_to(next));
                        prop_assert_eq!(outcome.payment.status, next);
                        observed.push(next);
                    }
                    Err(e) => {
                        prop_assert!(!before.can_transition_to(next));
                        prop_assert_eq!(e.kind(), ErrorKind::Conflict);
                    }
                }
            }

            for pair in observed.windows(2) {
                prop_assert!(pair[0].can_transition_to(pair[1]));
            }
            let registration = h.services.registrations.get(reg).await.unwrap();
            prop_assert_eq!(registration.payment_status(), observed.last().copied());
            Ok(())
        })?;
    }
}
