//! Cache backend trait and counters.

use std::time::Duration;

use async_trait::async_trait;
use sprint_core::CacheError;

/// Key-value backend holding serialized snapshots.
///
/// Backends are ephemeral and may fail at any time; the read-through layer
/// converts every error into a miss or a no-op. Implementations must be safe
/// for concurrent use.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get the raw value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, expiring after `ttl` when given.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Remove `key`. Returns whether something was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every key starting with `prefix`. Returns the number removed.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError>;

    /// Cheap liveness probe for readiness checks.
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Counters kept by the read-through layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Backend faults absorbed as misses or no-ops.
    pub errors: u64,
    pub invalidations: u64,
    pub populations: u64,
    /// Populations dropped because an invalidation raced the fetch.
    pub skipped_populations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
