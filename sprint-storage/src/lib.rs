//! Sprint Storage - collaborator traits and the read-through cache layer.
//!
//! The persistent store, the object store and the cache backend are each
//! modelled as an async trait so the domain crate can be wired against
//! Postgres, HTTP object storage and Redis in production and against the
//! in-memory implementations here in tests.

pub mod cache;
mod memory;
mod object_store;
mod store;

pub use cache::{
    CacheBackend, CacheConfig, CacheKey, CacheRead, CacheStats, MemoryCacheBackend,
    ReadThroughCache, StorageFetcher,
};
#[cfg(feature = "redis-backend")]
pub use cache::RedisCacheBackend;
pub use memory::InMemoryStore;
pub use object_store::{InMemoryObjectStore, ObjectStore, StoredObject};
pub use store::AsyncStore;
