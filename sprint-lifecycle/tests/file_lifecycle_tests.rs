//! File retention transitions and sweep safety.

use chrono::{Duration, Utc};
use proptest::prelude::*;
use sprint_core::{ErrorKind, Retention, UsageTag};
use sprint_lifecycle::{ReclaimOutcome, SweepPolicy};
use sprint_storage::AsyncStore;
use sprint_test_utils::{generators::arb_assigned_usage, Harness};

#[tokio::test]
async fn test_attach_detach_attach_leaves_single_owner() {
    let h = Harness::new();
    let file = h.upload().await.unwrap();
    let files = &h.services.files;

    files.attach(&[file.file_id], UsageTag::EventPhotos).await.unwrap();
    files.detach(&[file.file_id]).await.unwrap();
    files.attach(&[file.file_id], UsageTag::Gallery).await.unwrap();

    let stored = h.store.file_get(file.file_id).await.unwrap().unwrap();
    assert_eq!(stored.usage, UsageTag::Gallery);
    assert_eq!(stored.retention, Retention::Permanent);

    // Only the final listing contains it.
    assert!(files
        .list_by_usage(UsageTag::EventPhotos)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(files.list_by_usage(UsageTag::Gallery).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_permanent_file_survives_sweep_regardless_of_age() {
    let h = Harness::new();
    let old = h.seed_aged_file(Duration::days(365)).await.unwrap();
    h.services
        .files
        .attach(&[old.file_id], UsageTag::RuleBook)
        .await
        .unwrap();

    let report = h.services.files.sweep().await.unwrap();
    assert_eq!(report.reclaimed, 0);
    assert!(h.objects.contains(&old.storage_handle));
    assert!(h.store.file_get(old.file_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_file_attached_mid_sweep_is_not_deleted() {
    let h = Harness::new();
    let attached = h.seed_aged_file(Duration::days(3)).await.unwrap();
    let orphan = h.seed_aged_file(Duration::days(3)).await.unwrap();
    let files = &h.services.files;

    // The sweep lists its candidates first...
    let cutoff = Utc::now() - files.policy().retention;
    let candidates = files.sweep_candidates(cutoff).await.unwrap();
    assert_eq!(candidates.len(), 2);

    // ...an owner claims one of them before its turn...
    files
        .attach(&[attached.file_id], UsageTag::EventPhotos)
        .await
        .unwrap();

    // ...and the per-file re-check spares it.
    let mut outcomes = Vec::new();
    for candidate in &candidates {
        outcomes.push((
            candidate.file_id,
            files
                .reclaim_if_temporary(candidate.file_id, cutoff)
                .await
                .unwrap(),
        ));
    }
    for (id, outcome) in outcomes {
        if id == attached.file_id {
            assert_eq!(outcome, ReclaimOutcome::Skipped);
        } else {
            assert_eq!(outcome, ReclaimOutcome::Reclaimed);
        }
    }

    assert!(h.objects.contains(&attached.storage_handle));
    assert!(!h.objects.contains(&orphan.storage_handle));
    let survivor = files.get_file(attached.file_id).await.unwrap();
    assert_eq!(survivor.retention, Retention::Permanent);
}

#[tokio::test]
async fn test_detached_file_becomes_reclaimable() {
    let h = Harness::new();
    let old = h.seed_aged_file(Duration::days(2)).await.unwrap();
    let photo_event = h.event(vec![old.file_id]).await.unwrap();

    assert_eq!(h.services.files.sweep().await.unwrap().reclaimed, 0);

    h.services
        .events
        .replace_photos(photo_event.event_id, vec![])
        .await
        .unwrap();
    let report = h.services.files.sweep().await.unwrap();
    assert_eq!(report.reclaimed, 1);
    assert_eq!(
        h.services
            .files
            .get_file(old.file_id)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn test_sweep_respects_batch_size() {
    let h = Harness::with_policy(SweepPolicy {
        retention: Duration::hours(1),
        batch_size: 2,
    });
    for _ in 0..5 {
        h.seed_aged_file(Duration::hours(2)).await.unwrap();
    }
    assert_eq!(h.services.files.sweep().await.unwrap().reclaimed, 2);
    assert_eq!(h.services.files.sweep().await.unwrap().reclaimed, 2);
    assert_eq!(h.services.files.sweep().await.unwrap().reclaimed, 1);
    assert_eq!(h.services.files.sweep().await.unwrap().scanned, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sweeps_reclaim_each_file_once() {
    let h = Harness::new();
    for _ in 0..20 {
        h.seed_aged_file(Duration::days(2)).await.unwrap();
    }

    let a = h.services.files.clone();
    let b = h.services.files.clone();
    let (ra, rb) = tokio::join!(
        tokio::spawn(async move { a.sweep().await }),
        tokio::spawn(async move { b.sweep().await })
    );
    let (ra, rb) = (ra.unwrap().unwrap(), rb.unwrap().unwrap());
    assert_eq!(ra.reclaimed + rb.reclaimed, 20);
    assert!(h.objects.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any sequence of attaches and detaches ends in the state of the last
    /// operation.
    #[test]
    fn prop_last_attach_wins(ops in prop::collection::vec(prop::option::of(arb_assigned_usage()), 1..8)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let h = Harness::new();
            let file = h.upload().await.unwrap();
            for op in &ops {
                match op {
                    Some(usage) => {
                        h.services.files.attach(&[file.file_id], *usage).await.unwrap();
                    }
                    None => {
                        h.services.files.detach(&[file.file_id]).await.unwrap();
                    }
                }
            }

            let stored = h.services.files.get_file(file.file_id).await.unwrap();
            match ops.last().copied().flatten() {
                Some(usage) => {
                    prop_assert_eq!(stored.usage, usage);
                    prop_assert_eq!(stored.retention, Retention::Permanent);
                }
                None => {
                    prop_assert_eq!(stored.usage, UsageTag::Unassigned);
                    prop_assert_eq!(stored.retention, Retention::Temporary);
                }
            }
            Ok(())
        })?;
    }
}
