//! Temporary File Sweep
//!
//! Uploads start out `Temporary`. Attaching a file to an event or a gallery
//! item promotes it to `Permanent`; anything still `Temporary` after the
//! retention window was abandoned and gets reclaimed here. Each candidate is
//! re-checked by a conditional delete, so a file attached after it was
//! listed survives the pass.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sprint_lifecycle::{FileLifecycle, SweepPolicy};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::constants::{
    DEFAULT_SWEEP_BATCH_SIZE, DEFAULT_SWEEP_INTERVAL_SECS, DEFAULT_SWEEP_RETENTION_SECS,
};
use crate::telemetry::METRICS;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the file sweep background task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSweepConfig {
    /// How often a pass runs (default: 1 hour)
    pub interval: Duration,

    /// Age past which a `Temporary` file is reclaimable (default: 24 hours)
    pub retention: Duration,

    /// Maximum candidates per pass (default: 100)
    pub batch_size: usize,

    /// Whether the task is spawned at all (default: true)
    pub enabled: bool,
}

impl Default for FileSweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            retention: Duration::from_secs(DEFAULT_SWEEP_RETENTION_SECS),
            batch_size: DEFAULT_SWEEP_BATCH_SIZE,
            enabled: true,
        }
    }
}

impl FileSweepConfig {
    /// # Environment Variables
    /// - `SPRINT_SWEEP_INTERVAL_SECS`: time between passes (default: 3600)
    /// - `SPRINT_SWEEP_RETENTION_SECS`: reclaim threshold (default: 86400)
    /// - `SPRINT_SWEEP_BATCH_SIZE`: candidates per pass (default: 100)
    /// - `SPRINT_SWEEP_ENABLED`: set to `false` to disable (default: true)
    pub fn from_env() -> Self {
        let interval = Duration::from_secs(
            std::env::var("SPRINT_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
        );

        let retention = Duration::from_secs(
            std::env::var("SPRINT_SWEEP_RETENTION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SWEEP_RETENTION_SECS),
        );

        let batch_size = std::env::var("SPRINT_SWEEP_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_SWEEP_BATCH_SIZE);

        let enabled = std::env::var("SPRINT_SWEEP_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        Self {
            interval,
            retention,
            batch_size,
            enabled,
        }
    }

    /// Short windows for local runs.
    pub fn development() -> Self {
        Self {
            interval: Duration::from_secs(60),
            retention: Duration::from_secs(600),
            batch_size: 10,
            enabled: true,
        }
    }

    pub fn production() -> Self {
        Self::default()
    }

    /// The policy [`FileLifecycle`] applies on each pass.
    pub fn policy(&self) -> SweepPolicy {
        SweepPolicy {
            retention: chrono::Duration::from_std(self.retention)
                .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_SWEEP_RETENTION_SECS as i64)),
            batch_size: self.batch_size,
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for sweep activity since startup.
#[derive(Debug, Default)]
pub struct FileSweepMetrics {
    /// Passes completed
    pub runs: AtomicU64,

    /// Files whose record and object were both removed
    pub reclaimed: AtomicU64,

    /// Candidates that were claimed or gone when their turn came
    pub skipped: AtomicU64,

    /// Records removed whose backing object could not be deleted
    pub storage_failures: AtomicU64,

    /// Passes that failed outright
    pub errors: AtomicU64,
}

impl FileSweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> FileSweepSnapshot {
        FileSweepSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of sweep metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSweepSnapshot {
    pub runs: u64,
    pub reclaimed: u64,
    pub skipped: u64,
    pub storage_failures: u64,
    pub errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Run one sweep pass and fold its report into `metrics`.
pub async fn run_sweep_once(files: &FileLifecycle, metrics: &FileSweepMetrics) {
    metrics.runs.fetch_add(1, Ordering::Relaxed);

    match files.sweep().await {
        Ok(report) => {
            metrics.reclaimed.fetch_add(report.reclaimed, Ordering::Relaxed);
            metrics.skipped.fetch_add(report.skipped, Ordering::Relaxed);
            metrics
                .storage_failures
                .fetch_add(report.storage_failures, Ordering::Relaxed);
            if let Ok(m) = METRICS.as_ref() {
                m.record_sweep(&report);
            }

            if report.scanned == 0 {
                tracing::trace!("File sweep pass found no candidates");
            }
        }
        Err(e) => {
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "File sweep pass failed");
        }
    }
}

/// Periodically reclaim abandoned temporary files until shutdown.
///
/// The first pass runs immediately. Returns the metrics collected over the
/// task's lifetime.
pub async fn file_sweep_task(
    files: FileLifecycle,
    config: FileSweepConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<FileSweepMetrics> {
    let metrics = Arc::new(FileSweepMetrics::new());

    let mut sweep_interval = interval(config.interval);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        retention_secs = config.retention.as_secs(),
        batch_size = config.batch_size,
        "File sweep task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender also means shutdown.
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("File sweep task shutting down");
                    break;
                }
            }

            _ = sweep_interval.tick() => {
                run_sweep_once(&files, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        runs = snapshot.runs,
        reclaimed = snapshot.reclaimed,
        skipped = snapshot.skipped,
        storage_failures = snapshot.storage_failures,
        errors = snapshot.errors,
        "File sweep task completed"
    );

    metrics
}
