//! Read-through cache with invalidation ordering guarantees.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sprint_core::SprintResult;
use uuid::Uuid;

use super::key::CacheKey;
use super::read::CacheRead;
use super::traits::{CacheBackend, CacheStats};

/// Number of generation counters keys are hashed onto.
const GENERATION_SLOTS: usize = 1024;

/// Configuration for the read-through cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied to every populated entry. `None` keeps entries until
    /// invalidated.
    pub entry_ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_ttl: Some(Duration::from_secs(3600)), // 1 hour
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = Some(ttl);
        self
    }

    /// Keep entries until they are invalidated.
    pub fn without_ttl(mut self) -> Self {
        self.entry_ttl = None;
        self
    }
}

/// Storage fetcher for retrieving a value from the persistent store on a
/// cache miss.
#[async_trait]
pub trait StorageFetcher<T>: Send + Sync {
    /// Load the current persisted value. Store failures propagate.
    async fn fetch(&self) -> SprintResult<Option<T>>;
}

/// Generation counters used to detect an invalidation that raced a read.
///
/// A reader takes a token before it queries the store. The token is stored
/// next to the value it populates, and a read only accepts an entry whose
/// token is still current. Keys share hashed slots, so a collision can only
/// cause a needless miss.
struct InvalidationGuard {
    /// Distinguishes entries written by this cache from entries written by
    /// other processes sharing the backend.
    origin: Uuid,
    slots: Box<[AtomicU64]>,
    /// Bumped by every prefix invalidation.
    epoch: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GuardToken {
    slot: usize,
    generation: u64,
    epoch: u64,
}

impl InvalidationGuard {
    fn new() -> Self {
        Self {
            origin: Uuid::now_v7(),
            slots: (0..GENERATION_SLOTS).map(|_| AtomicU64::new(0)).collect(),
            epoch: AtomicU64::new(0),
        }
    }

    fn slot(key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % GENERATION_SLOTS as u64) as usize
    }

    fn token(&self, key: &str) -> GuardToken {
        let slot = Self::slot(key);
        GuardToken {
            slot,
            generation: self.slots[slot].load(Ordering::SeqCst),
            epoch: self.epoch.load(Ordering::SeqCst),
        }
    }

    fn bump_key(&self, key: &str) {
        self.slots[Self::slot(key)].fetch_add(1, Ordering::SeqCst);
    }

    fn bump_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn is_current(&self, token: GuardToken) -> bool {
        self.slots[token.slot].load(Ordering::SeqCst) == token.generation
            && self.epoch.load(Ordering::SeqCst) == token.epoch
    }

    /// Whether an entry read back under `key` may be served.
    fn admits<T>(&self, key: &str, entry: &Entry<T>) -> bool {
        if entry.origin != self.origin {
            return true;
        }
        self.is_current(GuardToken {
            slot: Self::slot(key),
            generation: entry.generation,
            epoch: entry.epoch,
        })
    }
}

/// Backend representation of a cached value.
#[derive(Serialize, Deserialize)]
struct Entry<V> {
    origin: Uuid,
    generation: u64,
    epoch: u64,
    value: V,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    invalidations: AtomicU64,
    populations: AtomicU64,
    skipped_populations: AtomicU64,
}

impl Counters {
    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Read-through cache over a pluggable [`CacheBackend`].
///
/// - Reads never fail because of the cache. A backend error counts as a miss.
/// - Writers call [`invalidate`](Self::invalidate) after their store write
///   commits and before they return. They never write values into the cache.
/// - A reader that missed populates the key only if no invalidation of that
///   key happened while it was reading the store. The entry carries the
///   generation it was read under, so one that lands after a racing
///   invalidation is refused by every later read.
#[derive(Clone)]
pub struct ReadThroughCache {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
    guard: Arc<InvalidationGuard>,
    counters: Arc<Counters>,
}

impl ReadThroughCache {
    /// Create a new read-through cache.
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self {
            backend,
            config,
            guard: Arc::new(InvalidationGuard::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Create a new read-through cache with default configuration.
    pub fn with_defaults(backend: Arc<dyn CacheBackend>) -> Self {
        Self::new(backend, CacheConfig::default())
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a value from the cache. Any backend fault yields `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let raw = match self.backend.get(key.as_str()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                Counters::inc(&self.counters.misses);
                return None;
            }
            Err(e) => {
                Counters::inc(&self.counters.errors);
                Counters::inc(&self.counters.misses);
                tracing::warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str::<Entry<T>>(&raw) {
            Ok(entry) if self.guard.admits(key.as_str(), &entry) => {
                Counters::inc(&self.counters.hits);
                Some(entry.value)
            }
            Ok(_) => {
                Counters::inc(&self.counters.misses);
                tracing::debug!(key = %key, "Cache entry predates an invalidation, ignoring it");
                None
            }
            Err(e) => {
                Counters::inc(&self.counters.errors);
                Counters::inc(&self.counters.misses);
                tracing::warn!(key = %key, error = %e, "Undecodable cache entry, dropping it");
                if let Err(e) = self.backend.delete(key.as_str()).await {
                    tracing::warn!(key = %key, error = %e, "Failed to drop undecodable cache entry");
                }
                None
            }
        }
    }

    /// Best-effort write of `value` under `key`. Failures are logged only.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Option<Duration>,
    ) {
        let token = self.guard.token(key.as_str());
        self.write_entry(key, value, token, ttl).await;
    }

    async fn write_entry<T: Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        value: &T,
        token: GuardToken,
        ttl: Option<Duration>,
    ) {
        let entry = Entry {
            origin: self.guard.origin,
            generation: token.generation,
            epoch: token.epoch,
            value,
        };
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                Counters::inc(&self.counters.errors);
                tracing::warn!(key = %key, error = %e, "Failed to serialize cache value");
                return;
            }
        };

        match self.backend.set(key.as_str(), raw, ttl).await {
            Ok(()) => Counters::inc(&self.counters.populations),
            Err(e) => {
                Counters::inc(&self.counters.errors);
                tracing::warn!(key = %key, error = %e, "Cache write failed");
            }
        }
    }

    /// Get a value from the cache, falling back to `fetcher` on a miss.
    ///
    /// Returns `Ok(None)` if the value does not exist in the store. Store
    /// errors propagate; cache errors never do.
    pub async fn get_or_fetch<T, F>(
        &self,
        key: &CacheKey,
        fetcher: &F,
    ) -> SprintResult<Option<CacheRead<T>>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: StorageFetcher<T> + ?Sized,
    {
        if let Some(value) = self.get::<T>(key).await {
            return Ok(Some(CacheRead::from_cache(value)));
        }

        // Taken before the store read so an invalidation issued by a writer
        // that commits while we read is observed below.
        let token = self.guard.token(key.as_str());

        let Some(value) = fetcher.fetch().await? else {
            return Ok(None);
        };

        self.populate(key, &value, token).await;
        Ok(Some(CacheRead::from_storage(value)))
    }

    async fn populate<T: Serialize>(&self, key: &CacheKey, value: &T, token: GuardToken) {
        if !self.guard.is_current(token) {
            Counters::inc(&self.counters.skipped_populations);
            tracing::debug!(key = %key, "Invalidation raced the read, not populating");
            return;
        }

        self.write_entry(key, value, token, self.config.entry_ttl)
            .await;

        // An invalidation may have landed between the check and the write.
        // Reads already refuse the entry; this only frees the slot.
        if !self.guard.is_current(token) {
            Counters::inc(&self.counters.skipped_populations);
            tracing::debug!(key = %key, "Invalidation raced the write, dropping entry");
            if let Err(e) = self.backend.delete(key.as_str()).await {
                Counters::inc(&self.counters.errors);
                tracing::warn!(key = %key, error = %e, "Failed to drop raced cache entry");
            }
        }
    }

    /// Remove `key`. Awaited by writers after their store write commits.
    pub async fn invalidate(&self, key: &CacheKey) {
        self.guard.bump_key(key.as_str());
        Counters::inc(&self.counters.invalidations);
        if let Err(e) = self.backend.delete(key.as_str()).await {
            Counters::inc(&self.counters.errors);
            tracing::warn!(key = %key, error = %e, "Cache invalidation failed");
        }
    }

    /// Invalidate several keys in order.
    pub async fn invalidate_all<'a, I>(&self, keys: I)
    where
        I: IntoIterator<Item = &'a CacheKey>,
    {
        for key in keys {
            self.invalidate(key).await;
        }
    }

    /// Remove every key starting with `prefix`. Returns the number of
    /// entries the backend reported removing (0 on backend failure).
    pub async fn invalidate_prefix(&self, prefix: &str) -> u64 {
        self.guard.bump_all();
        Counters::inc(&self.counters.invalidations);
        match self.backend.delete_by_prefix(prefix).await {
            Ok(removed) => removed,
            Err(e) => {
                Counters::inc(&self.counters.errors);
                tracing::warn!(prefix = %prefix, error = %e, "Cache prefix invalidation failed");
                0
            }
        }
    }

    /// Whether the backend currently answers.
    pub async fn is_available(&self) -> bool {
        self.backend.ping().await.is_ok()
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            errors: c.errors.load(Ordering::Relaxed),
            invalidations: c.invalidations.load(Ordering::Relaxed),
            populations: c.populations.load(Ordering::Relaxed),
            skipped_populations: c.skipped_populations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheBackend;
    use sprint_core::{CacheError, EventId, StorageError};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::{Mutex, Notify};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Snapshot {
        version: u32,
    }

    /// Fetcher reading from a shared "store" cell and counting calls.
    struct CellFetcher {
        cell: Arc<Mutex<Option<Snapshot>>>,
        calls: AtomicUsize,
    }

    impl CellFetcher {
        fn new(value: Option<Snapshot>) -> Self {
            Self {
                cell: Arc::new(Mutex::new(value)),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StorageFetcher<Snapshot> for CellFetcher {
        async fn fetch(&self) -> SprintResult<Option<Snapshot>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.cell.lock().await.clone())
        }
    }

    /// Simulates a writer that commits and invalidates while the reader is
    /// between its store read and its cache population.
    struct RacingFetcher {
        cache: ReadThroughCache,
        key: CacheKey,
        cell: Arc<Mutex<Snapshot>>,
    }

    #[async_trait]
    impl StorageFetcher<Snapshot> for RacingFetcher {
        async fn fetch(&self) -> SprintResult<Option<Snapshot>> {
            let stale = self.cell.lock().await.clone();
            *self.cell.lock().await = Snapshot {
                version: stale.version + 1,
            };
            self.cache.invalidate(&self.key).await;
            Ok(Some(stale))
        }
    }

    /// Backend whose `set` pauses once before the write lands and once
    /// after, so a test can interleave other calls with it.
    #[derive(Default)]
    struct PausingSetBackend {
        inner: MemoryCacheBackend,
        entered: Notify,
        resume_write: Notify,
        written: Notify,
        resume_return: Notify,
    }

    #[async_trait]
    impl CacheBackend for PausingSetBackend {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            self.inner.get(key).await
        }

        async fn set(
            &self,
            key: &str,
            value: String,
            ttl: Option<Duration>,
        ) -> Result<(), CacheError> {
            self.entered.notify_one();
            self.resume_write.notified().await;
            self.inner.set(key, value, ttl).await?;
            self.written.notify_one();
            self.resume_return.notified().await;
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<bool, CacheError> {
            self.inner.delete(key).await
        }

        async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
            self.inner.delete_by_prefix(prefix).await
        }

        async fn ping(&self) -> Result<(), CacheError> {
            self.inner.ping().await
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl StorageFetcher<Snapshot> for FailingFetcher {
        async fn fetch(&self) -> SprintResult<Option<Snapshot>> {
            Err(StorageError::Unavailable {
                reason: "connection refused".to_string(),
            }
            .into())
        }
    }

    fn setup() -> (Arc<MemoryCacheBackend>, ReadThroughCache) {
        let backend = Arc::new(MemoryCacheBackend::new());
        let cache = ReadThroughCache::with_defaults(backend.clone());
        (backend, cache)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (_backend, cache) = setup();
        let key = CacheKey::event(EventId::new());
        let fetcher = CellFetcher::new(Some(Snapshot { version: 1 }));

        let first = cache.get_or_fetch(&key, &fetcher).await.unwrap().unwrap();
        assert!(first.was_cache_miss());
        let second = cache.get_or_fetch(&key, &fetcher).await.unwrap().unwrap();
        assert!(second.was_cache_hit);
        assert_eq!(second.into_value(), Snapshot { version: 1 });
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.populations, 1);
    }

    #[tokio::test]
    async fn test_absent_value_is_not_cached() {
        let (backend, cache) = setup();
        let key = CacheKey::event(EventId::new());
        let fetcher = CellFetcher::new(None);

        assert!(cache.get_or_fetch(&key, &fetcher).await.unwrap().is_none());
        assert!(!backend.contains(key.as_str()));
    }

    #[tokio::test]
    async fn test_write_then_read_never_sees_old_value() {
        let (_backend, cache) = setup();
        let key = CacheKey::event(EventId::new());
        let fetcher = CellFetcher::new(Some(Snapshot { version: 1 }));
        cache.get_or_fetch(&key, &fetcher).await.unwrap();

        *fetcher.cell.lock().await = Some(Snapshot { version: 2 });
        cache.invalidate(&key).await;

        let read = cache.get_or_fetch(&key, &fetcher).await.unwrap().unwrap();
        assert_eq!(read.value, Snapshot { version: 2 });
    }

    #[tokio::test]
    async fn test_raced_invalidation_prevents_stale_population() {
        let (backend, cache) = setup();
        let key = CacheKey::event(EventId::new());
        let racing = RacingFetcher {
            cache: cache.clone(),
            key: key.clone(),
            cell: Arc::new(Mutex::new(Snapshot { version: 1 })),
        };

        let read = cache.get_or_fetch(&key, &racing).await.unwrap().unwrap();
        assert_eq!(read.value.version, 1);
        assert!(!backend.contains(key.as_str()));
        assert_eq!(cache.stats().skipped_populations, 1);

        // The next reader sees the writer's value.
        let fetcher = CellFetcher {
            cell: Arc::new(Mutex::new(Some(racing.cell.lock().await.clone()))),
            calls: AtomicUsize::new(0),
        };
        let read = cache.get_or_fetch(&key, &fetcher).await.unwrap().unwrap();
        assert_eq!(read.value.version, 2);
    }

    #[tokio::test]
    async fn test_population_landing_after_invalidation_is_refused() {
        let backend = Arc::new(PausingSetBackend::default());
        let cache = ReadThroughCache::with_defaults(backend.clone());
        let key = CacheKey::event(EventId::new());
        let fetcher = Arc::new(CellFetcher::new(Some(Snapshot { version: 1 })));

        let reader = {
            let cache = cache.clone();
            let key = key.clone();
            let fetcher = Arc::clone(&fetcher);
            tokio::spawn(async move { cache.get_or_fetch(&key, fetcher.as_ref()).await })
        };
        backend.entered.notified().await;

        // A writer commits and invalidates while the reader's write is in flight.
        *fetcher.cell.lock().await = Some(Snapshot { version: 2 });
        cache.invalidate(&key).await;

        backend.resume_write.notify_one();
        backend.written.notified().await;
        assert!(backend.inner.contains(key.as_str()));
        assert_eq!(cache.get::<Snapshot>(&key).await, None);

        backend.resume_return.notify_one();
        let read = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(read.value.version, 1);
        assert!(!backend.inner.contains(key.as_str()));

        // Let the next population through without pausing.
        backend.resume_write.notify_one();
        backend.resume_return.notify_one();
        let read = cache
            .get_or_fetch(&key, fetcher.as_ref())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.value.version, 2);
        assert_eq!(
            cache.get::<Snapshot>(&key).await,
            Some(Snapshot { version: 2 })
        );
    }

    #[tokio::test]
    async fn test_entries_from_another_cache_are_served() {
        let backend = Arc::new(MemoryCacheBackend::new());
        let first = ReadThroughCache::with_defaults(backend.clone());
        let second = ReadThroughCache::with_defaults(backend.clone());
        let key = CacheKey::event(EventId::new());

        first.put(&key, &Snapshot { version: 3 }, None).await;
        assert_eq!(
            second.get::<Snapshot>(&key).await,
            Some(Snapshot { version: 3 })
        );

        // An invalidation in one cache does not age the other's view.
        second.invalidate(&key).await;
        first.put(&key, &Snapshot { version: 4 }, None).await;
        assert_eq!(
            second.get::<Snapshot>(&key).await,
            Some(Snapshot { version: 4 })
        );
    }

    #[tokio::test]
    async fn test_backend_outage_is_fail_open() {
        let (backend, cache) = setup();
        backend.set_available(false);
        let key = CacheKey::event(EventId::new());
        let fetcher = CellFetcher::new(Some(Snapshot { version: 7 }));

        let read = cache.get_or_fetch(&key, &fetcher).await.unwrap().unwrap();
        assert_eq!(read.value.version, 7);
        cache.invalidate(&key).await;
        assert_eq!(cache.invalidate_prefix("Event:").await, 0);
        assert!(!cache.is_available().await);
        assert!(cache.stats().errors >= 3);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let (_backend, cache) = setup();
        let key = CacheKey::event(EventId::new());
        let err = cache.get_or_fetch(&key, &FailingFetcher).await.unwrap_err();
        assert_eq!(err.kind(), sprint_core::ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_dropped() {
        let (backend, cache) = setup();
        let key = CacheKey::events();
        backend.set(key.as_str(), "not json".to_string(), None).await.unwrap();

        assert!(cache.get::<Snapshot>(&key).await.is_none());
        assert!(!backend.contains(key.as_str()));
    }

    #[tokio::test]
    async fn test_prefix_invalidation_blocks_inflight_population() {
        let (backend, cache) = setup();
        let key = CacheKey::events();
        let token = cache.guard.token(key.as_str());
        cache.invalidate_prefix("Event:").await;

        cache.populate(&key, &Snapshot { version: 1 }, token).await;
        assert!(!backend.contains(key.as_str()));
    }
}
