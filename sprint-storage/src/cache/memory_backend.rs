//! In-process cache backend.
//!
//! Used when no Redis URL is configured and throughout the test suites. It
//! counts deletions per key so tests can assert exactly how often a key was
//! invalidated, and it can be switched off to simulate an outage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use sprint_core::CacheError;

use super::traits::CacheBackend;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug)]
pub struct MemoryCacheBackend {
    entries: DashMap<String, Entry>,
    deletions: DashMap<String, u64>,
    available: AtomicBool,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            deletions: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle a simulated outage. While unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// How many times `key` was deleted, directly or through a prefix.
    pub fn invalidation_count(&self, key: &str) -> u64 {
        self.deletions.get(key).map(|c| *c).unwrap_or(0)
    }

    pub fn reset_invalidation_counts(&self) {
        self.deletions.clear();
    }

    /// Whether a live entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_available(&self) -> Result<(), CacheError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Unavailable {
                reason: "in-memory cache switched off".to_string(),
            })
        }
    }

    fn record_deletion(&self, key: &str) {
        *self.deletions.entry(key.to_string()).or_insert(0) += 1;
    }
}

impl Default for MemoryCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check_available()?;
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.check_available()?;
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.check_available()?;
        self.record_deletion(key);
        Ok(self.entries.remove(key).is_some())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        self.check_available()?;
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0;
        for key in keys {
            self.record_deletion(&key);
            if self.entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.check_available()
    }
}
