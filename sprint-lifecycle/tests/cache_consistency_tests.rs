//! Cache consistency: after a committed write, a read through the cache
//! never returns the pre-write value.

use std::time::Duration;

use sprint_core::{PaymentStatus, Retention, UsageTag};
use sprint_storage::CacheKey;
use sprint_test_utils::{fixtures, Harness};

#[tokio::test]
async fn test_file_write_then_read_is_fresh() {
    let h = Harness::new();
    let file = h.upload().await.unwrap();

    // Warm both the entry and the usage listing.
    h.services.files.get_file(file.file_id).await.unwrap();
    let unassigned = h
        .services
        .files
        .list_by_usage(UsageTag::Unassigned)
        .await
        .unwrap();
    assert_eq!(unassigned.len(), 1);

    h.services
        .files
        .attach(&[file.file_id], UsageTag::Brochure)
        .await
        .unwrap();

    let read = h.services.files.get_file(file.file_id).await.unwrap();
    assert_eq!(read.usage, UsageTag::Brochure);
    assert_eq!(read.retention, Retention::Permanent);
    assert!(h
        .services
        .files
        .list_by_usage(UsageTag::Unassigned)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        h.services
            .files
            .list_by_usage(UsageTag::Brochure)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_event_write_then_read_is_fresh() {
    let h = Harness::new();
    let first = h.upload().await.unwrap();
    let second = h.upload().await.unwrap();
    let event = h.event(vec![first.file_id]).await.unwrap();

    // Warm the per-event key and the listing.
    h.services.events.get(event.event_id).await.unwrap();
    h.services.events.list().await.unwrap();

    h.services
        .events
        .replace_photos(event.event_id, vec![second.file_id])
        .await
        .unwrap();

    let read = h.services.events.get(event.event_id).await.unwrap();
    assert_eq!(read.photos, vec![second.file_id]);
    let listed = h.services.events.list().await.unwrap();
    assert_eq!(listed[0].photos, vec![second.file_id]);
}

#[tokio::test]
async fn test_event_write_is_fresh_when_file_updates_fail() {
    let h = Harness::new();
    let photo = h.upload().await.unwrap();
    let event = h.event(vec![]).await.unwrap();

    h.services.events.get(event.event_id).await.unwrap();
    h.services.events.list().await.unwrap();

    h.store.set_fail_file_writes(true);
    let updated = h
        .services
        .events
        .replace_photos(event.event_id, vec![photo.file_id])
        .await
        .unwrap();
    assert_eq!(updated.photos, vec![photo.file_id]);

    let read = h.services.events.get(event.event_id).await.unwrap();
    assert_eq!(read.photos, vec![photo.file_id]);
    let listed = h.services.events.list().await.unwrap();
    assert_eq!(listed[0].photos, vec![photo.file_id]);

    // The photo was never claimed, so it is still a sweep candidate.
    h.store.set_fail_file_writes(false);
    let file = h.services.files.get_file(photo.file_id).await.unwrap();
    assert_eq!(file.retention, Retention::Temporary);
}

#[tokio::test]
async fn test_registration_write_then_read_is_fresh() {
    let h = Harness::new();
    let event = h.event(vec![]).await.unwrap();
    let registration = h.registration(vec![event.event_id]).await.unwrap();

    let before = h
        .services
        .registrations
        .get(registration.registration_id)
        .await
        .unwrap();
    assert_eq!(before.payment, None);

    let payment = h
        .pending_payment(registration.registration_id)
        .await
        .unwrap();
    let read = h
        .services
        .registrations
        .get(registration.registration_id)
        .await
        .unwrap();
    assert_eq!(read.payment, Some(payment.snapshot()));

    h.services
        .payments
        .transition_by_id(payment.payment_id, PaymentStatus::Completed)
        .await
        .unwrap();
    let read = h
        .services
        .registrations
        .get(registration.registration_id)
        .await
        .unwrap();
    assert_eq!(read.payment_status(), Some(PaymentStatus::Completed));
    assert_eq!(
        h.services
            .payments
            .get_payment(payment.payment_id)
            .await
            .unwrap()
            .status,
        PaymentStatus::Completed
    );
}

#[tokio::test]
async fn test_cache_outage_fails_open() {
    let h = Harness::new();
    let event = h.event(vec![]).await.unwrap();

    h.cache_backend.set_available(false);
    let read = h.services.events.get(event.event_id).await.unwrap();
    assert_eq!(read.event_id, event.event_id);

    // Writes still succeed while the cache is down.
    let file = h.upload().await.unwrap();
    h.services
        .events
        .replace_photos(event.event_id, vec![file.file_id])
        .await
        .unwrap();

    h.cache_backend.set_available(true);
    let read = h.services.events.get(event.event_id).await.unwrap();
    assert_eq!(read.photos, vec![file.file_id]);
    assert!(h.services.cache().stats().errors > 0);
}

#[tokio::test]
async fn test_store_outage_is_a_hard_failure() {
    let h = Harness::new();
    let event = h.event(vec![]).await.unwrap();
    h.services.events.get(event.event_id).await.unwrap();
    h.store.set_unavailable(true);

    // Cached values are still served.
    assert!(h.services.events.get(event.event_id).await.is_ok());

    let err = h
        .services
        .registrations
        .create(fixtures::new_registration("Late", vec![event.event_id]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), sprint_core::ErrorKind::Unavailable);
}

#[tokio::test]
async fn test_flush_cache_drops_kind() {
    let h = Harness::new();
    let event = h.event(vec![]).await.unwrap();
    h.services.events.get(event.event_id).await.unwrap();
    h.services.events.list().await.unwrap();
    assert!(h.cache_backend.contains(CacheKey::event(event.event_id).as_str()));

    let removed = h
        .services
        .flush_cache(sprint_core::EntityKind::Event)
        .await;
    assert_eq!(removed, 2);
    assert!(!h.cache_backend.contains(CacheKey::events().as_str()));
}

#[tokio::test]
async fn test_confirmation_mail_is_sent_in_background() {
    let h = Harness::new();
    let event = h.event(vec![]).await.unwrap();
    let registration = h.registration(vec![event.event_id]).await.unwrap();

    assert!(h.mailer.wait_for(1, Duration::from_secs(2)).await);
    let sent = h.mailer.sent();
    let mail = &sent[0];
    assert_eq!(mail.to, "asha@example.com");
    assert!(mail.text.contains(&registration.registration_id.to_string()));
}

#[tokio::test]
async fn test_mail_failure_does_not_fail_registration() {
    let h = Harness::new();
    h.mailer.set_failing(true);
    let event = h.event(vec![]).await.unwrap();
    let registration = h.registration(vec![event.event_id]).await.unwrap();
    assert_eq!(
        h.services
            .registrations
            .get(registration.registration_id)
            .await
            .unwrap()
            .registration_id,
        registration.registration_id
    );
}
