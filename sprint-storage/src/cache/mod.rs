//! Read-through cache layer.
//!
//! Reads go cache-first and fall through to the persistent store on a miss,
//! populating the cache afterwards. Writes commit to the store first and then
//! invalidate: a writer never updates a cached value in place.
//!
//! The cache is fail-open. A backend fault is logged and treated as a miss
//! on reads and as a no-op on writes, so an outage of the cache never blocks
//! a request.
//!
//! Every key is produced by [`CacheKey`]. Call sites never concatenate key
//! strings themselves, which keeps read and write paths on one namespace.
//!
//! # Example
//!
//! ```ignore
//! let read = cache.get_or_fetch(&CacheKey::event(id), &EventFetcher { store, id }).await?;
//! if let Some(read) = read {
//!     tracing::debug!(hit = read.was_cache_hit, "event loaded");
//! }
//!
//! store.event_update(&event).await?;
//! cache.invalidate(&CacheKey::event(id)).await;
//! ```

mod key;
mod memory_backend;
mod read;
mod read_through;
#[cfg(feature = "redis-backend")]
mod redis_backend;
mod traits;

pub use key::CacheKey;
pub use memory_backend::MemoryCacheBackend;
pub use read::CacheRead;
pub use read_through::{CacheConfig, ReadThroughCache, StorageFetcher};
#[cfg(feature = "redis-backend")]
pub use redis_backend::RedisCacheBackend;
pub use traits::{CacheBackend, CacheStats};
