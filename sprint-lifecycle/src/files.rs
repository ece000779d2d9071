//! File Lifecycle Manager
//!
//! Uploaded objects start out `Temporary` and `Unassigned`. An owner that
//! commits a reference attaches the file (usage tag plus `Permanent`), and an
//! owner that drops a reference detaches it again. Nothing counts owners: a
//! detached file is simply a sweep candidate once it is old enough, and the
//! sweep re-checks every candidate in the same store statement that removes
//! it, so a file attached while a sweep runs survives.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sprint_core::{
    EntityKind, FileId, FileRecord, Retention, SprintError, SprintResult, Timestamp, UsageTag,
    UserId,
};
use sprint_storage::{AsyncStore, CacheKey, ObjectStore, ReadThroughCache};

use crate::fetchers::{FileFetcher, FilesByUsageFetcher};

/// How old a `Temporary` file must be before the sweep reclaims it, and how
/// many candidates one pass looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    pub retention: chrono::Duration,
    pub batch_size: usize,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            retention: chrono::Duration::hours(24),
            batch_size: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Client-side file name. Only its extension is kept.
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub owner: Option<UserId>,
}

/// Result of a batch attach or detach.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AttachReport {
    pub updated: Vec<FileRecord>,
    /// Ids that did not resolve to a live record. They were skipped.
    pub missing: Vec<FileId>,
}

/// Result of a direct delete. `success` is false when the record is gone but
/// the backing object could not be removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeleteOutcome {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SweepReport {
    /// Candidates listed at the start of the pass.
    pub scanned: u64,
    pub reclaimed: u64,
    /// Candidates that were attached (or removed) before their turn came.
    pub skipped: u64,
    /// Records removed whose backing object could not be deleted.
    pub storage_failures: u64,
}

/// What happened to one sweep candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimOutcome {
    Reclaimed,
    /// Record removed, object delete failed. The object may be leaked.
    ReclaimedObjectLeaked,
    /// No longer reclaimable when re-checked.
    Skipped,
}

#[derive(Clone)]
pub struct FileLifecycle {
    store: Arc<dyn AsyncStore>,
    objects: Arc<dyn ObjectStore>,
    cache: ReadThroughCache,
    policy: SweepPolicy,
}

impl FileLifecycle {
    pub fn new(
        store: Arc<dyn AsyncStore>,
        objects: Arc<dyn ObjectStore>,
        cache: ReadThroughCache,
        policy: SweepPolicy,
    ) -> Self {
        Self {
            store,
            objects,
            cache,
            policy,
        }
    }

    pub fn policy(&self) -> SweepPolicy {
        self.policy
    }

    // ========================================================================
    // UPLOAD
    // ========================================================================

    /// Store the bytes and create a `Temporary`/`Unassigned` record.
    pub async fn upload(&self, request: UploadRequest) -> SprintResult<FileRecord> {
        if request.content_type.trim().is_empty() {
            return Err(SprintError::missing_field("content_type"));
        }
        if request.bytes.is_empty() {
            return Err(SprintError::invalid_value("file", "empty upload"));
        }

        let file_id = FileId::new();
        let now = Utc::now();
        let name = object_name(now, file_id, &request.file_name);
        let size_bytes = request.bytes.len() as u64;

        let stored = self
            .objects
            .put(&name, &request.content_type, request.bytes)
            .await?;

        let record = FileRecord {
            file_id,
            name,
            content_type: request.content_type,
            size_bytes,
            url: stored.url,
            storage_handle: stored.handle,
            owner: request.owner,
            retention: Retention::Temporary,
            usage: UsageTag::Unassigned,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.store.file_insert(&record).await {
            // Without a record nothing would ever reclaim the object.
            if let Err(cleanup) = self.objects.delete(&record.storage_handle).await {
                tracing::warn!(
                    handle = %record.storage_handle,
                    error = %cleanup,
                    "Failed to remove object after record insert failed"
                );
            }
            return Err(e);
        }

        self.cache
            .invalidate_all(&CacheKey::aggregates_for_usage(UsageTag::Unassigned))
            .await;

        tracing::info!(file_id = %file_id, size_bytes, "File uploaded");
        Ok(record)
    }

    // ========================================================================
    // ATTACH / DETACH
    // ========================================================================

    /// Claim files for an owner with `Permanent` retention.
    pub async fn attach(&self, ids: &[FileId], usage: UsageTag) -> SprintResult<AttachReport> {
        self.attach_with_retention(ids, usage, Retention::Permanent)
            .await
    }

    /// Set usage tag and retention on every id. Ids that do not resolve are
    /// logged and skipped; store failures abort the batch.
    pub async fn attach_with_retention(
        &self,
        ids: &[FileId],
        usage: UsageTag,
        retention: Retention,
    ) -> SprintResult<AttachReport> {
        let mut report = AttachReport::default();

        for &id in ids {
            let previous = match self.store.file_get(id).await? {
                Some(file) if !file.is_deleted => file,
                _ => {
                    tracing::warn!(file_id = %id, usage = %usage.as_db_str(), "File not found, skipping");
                    report.missing.push(id);
                    continue;
                }
            };

            let Some(updated) = self.store.file_set_usage(id, usage, retention).await? else {
                tracing::warn!(file_id = %id, "File removed while attaching, skipping");
                report.missing.push(id);
                continue;
            };

            self.cache
                .invalidate_all(&file_keys(id, &[previous.usage, usage]))
                .await;

            tracing::debug!(
                file_id = %id,
                from = %previous.usage.as_db_str(),
                to = %usage.as_db_str(),
                retention = %retention.as_db_str(),
                "File usage updated"
            );
            report.updated.push(updated);
        }

        Ok(report)
    }

    /// Release files back to `Unassigned`/`Temporary`.
    pub async fn detach(&self, ids: &[FileId]) -> SprintResult<AttachReport> {
        self.attach_with_retention(ids, UsageTag::Unassigned, Retention::Temporary)
            .await
    }

    /// Release `released`, then claim `claimed` under `usage`, for an owner
    /// whose own write has already committed. Nothing is propagated: a
    /// failure is logged and the affected files keep whatever state they
    /// had. Returns whether every step succeeded.
    pub async fn reassign(&self, released: &[FileId], claimed: &[FileId], usage: UsageTag) -> bool {
        let mut synced = true;

        if !released.is_empty() {
            if let Err(e) = self.detach(released).await {
                tracing::warn!(files = ?released, error = %e, "Failed to release files after owner write");
                synced = false;
            }
        }
        if !claimed.is_empty() {
            if let Err(e) = self.attach(claimed, usage).await {
                tracing::warn!(
                    files = ?claimed,
                    usage = %usage.as_db_str(),
                    error = %e,
                    "Failed to claim files after owner write"
                );
                synced = false;
            }
        }

        synced
    }

    // ========================================================================
    // DELETE
    // ========================================================================

    /// Delete by textual id. A malformed id fails before any side effect.
    pub async fn delete(&self, raw_id: &str) -> SprintResult<DeleteOutcome> {
        let id = FileId::parse(raw_id)?;
        self.delete_by_id(id).await
    }

    /// Remove the record, then the object. An object failure is reported in
    /// the outcome; the record removal is not rolled back.
    pub async fn delete_by_id(&self, id: FileId) -> SprintResult<DeleteOutcome> {
        let record = self
            .store
            .file_delete(id)
            .await?
            .ok_or_else(|| SprintError::not_found(EntityKind::File, id))?;

        self.cache
            .invalidate_all(&file_keys(id, &[record.usage]))
            .await;

        let outcome = match self.objects.delete(&record.storage_handle).await {
            Ok(()) => DeleteOutcome {
                success: true,
                message: "File deleted successfully".to_string(),
            },
            Err(e) => {
                tracing::warn!(
                    file_id = %id,
                    handle = %record.storage_handle,
                    error = %e,
                    "Record deleted but object delete failed"
                );
                DeleteOutcome {
                    success: false,
                    message: e.to_string(),
                }
            }
        };

        tracing::info!(file_id = %id, success = outcome.success, "File deleted");
        Ok(outcome)
    }

    // ========================================================================
    // SWEEP
    // ========================================================================

    /// Reclaim `Temporary` files older than the policy's retention.
    pub async fn sweep(&self) -> SprintResult<SweepReport> {
        self.sweep_before(Utc::now() - self.policy.retention).await
    }

    pub async fn sweep_before(&self, cutoff: Timestamp) -> SprintResult<SweepReport> {
        let candidates = self.sweep_candidates(cutoff).await?;
        let mut report = SweepReport {
            scanned: candidates.len() as u64,
            ..Default::default()
        };

        for candidate in candidates {
            match self.reclaim_if_temporary(candidate.file_id, cutoff).await? {
                ReclaimOutcome::Reclaimed => report.reclaimed += 1,
                ReclaimOutcome::ReclaimedObjectLeaked => {
                    report.reclaimed += 1;
                    report.storage_failures += 1;
                }
                ReclaimOutcome::Skipped => report.skipped += 1,
            }
        }

        if report.scanned > 0 {
            tracing::info!(
                scanned = report.scanned,
                reclaimed = report.reclaimed,
                skipped = report.skipped,
                storage_failures = report.storage_failures,
                "File sweep finished"
            );
        }
        Ok(report)
    }

    /// Files that looked reclaimable when listed. Each one is re-checked by
    /// [`reclaim_if_temporary`](Self::reclaim_if_temporary).
    pub async fn sweep_candidates(&self, cutoff: Timestamp) -> SprintResult<Vec<FileRecord>> {
        self.store
            .file_list_temporary_before(cutoff, self.policy.batch_size)
            .await
    }

    /// Remove one file if it is still `Temporary` and older than `cutoff`.
    pub async fn reclaim_if_temporary(
        &self,
        id: FileId,
        cutoff: Timestamp,
    ) -> SprintResult<ReclaimOutcome> {
        let Some(record) = self.store.file_delete_if_temporary(id, cutoff).await? else {
            tracing::debug!(file_id = %id, "Sweep candidate no longer reclaimable");
            return Ok(ReclaimOutcome::Skipped);
        };

        self.cache
            .invalidate_all(&file_keys(id, &[record.usage]))
            .await;

        match self.objects.delete(&record.storage_handle).await {
            Ok(()) => Ok(ReclaimOutcome::Reclaimed),
            Err(e) => {
                tracing::warn!(
                    file_id = %id,
                    handle = %record.storage_handle,
                    error = %e,
                    "Swept record but object delete failed"
                );
                Ok(ReclaimOutcome::ReclaimedObjectLeaked)
            }
        }
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub async fn get_file(&self, id: FileId) -> SprintResult<FileRecord> {
        let fetcher = FileFetcher {
            store: Arc::clone(&self.store),
            id,
        };
        self.cache
            .get_or_fetch(&CacheKey::file(id), &fetcher)
            .await?
            .map(|read| read.into_value())
            .ok_or_else(|| SprintError::not_found(EntityKind::File, id))
    }

    pub async fn list_by_usage(&self, usage: UsageTag) -> SprintResult<Vec<FileRecord>> {
        let fetcher = FilesByUsageFetcher {
            store: Arc::clone(&self.store),
            usage,
        };
        Ok(self
            .cache
            .get_or_fetch(&CacheKey::files_by_usage(usage), &fetcher)
            .await?
            .map(|read| read.into_value())
            .unwrap_or_default())
    }
}

/// `file:<id>` plus every aggregate that lists files of the given tags.
fn file_keys(id: FileId, usages: &[UsageTag]) -> Vec<CacheKey> {
    let mut keys = vec![CacheKey::file(id)];
    for &usage in usages {
        for key in CacheKey::aggregates_for_usage(usage) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}

/// `<millis>-<file id><ext>`, keeping only a short alphanumeric extension of
/// the client's file name.
fn object_name(at: Timestamp, id: FileId, file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{}-{}{}", at.timestamp_millis(), id, ext)
}
