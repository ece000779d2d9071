//! Result wrapper for cache-layer reads.

/// A value returned by [`ReadThroughCache`](super::ReadThroughCache) along
/// with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRead<T> {
    pub value: T,
    pub was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    pub fn from_cache(value: T) -> Self {
        Self {
            value,
            was_cache_hit: true,
        }
    }

    pub fn from_storage(value: T) -> Self {
        Self {
            value,
            was_cache_hit: false,
        }
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }

    pub fn into_value(self) -> T {
        self.value
    }
}
