//! Redis cache backend.
//!
//! Uses a multiplexed `ConnectionManager`, which reconnects on its own, so
//! the backend can be cloned freely across request handlers. Prefix
//! invalidation walks the keyspace with `SCAN MATCH` rather than `KEYS`.

use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use sprint_core::CacheError;

use super::traits::CacheBackend;

fn unavailable(e: redis::RedisError) -> CacheError {
    CacheError::Unavailable {
        reason: e.to_string(),
    }
}

/// Escape glob metacharacters so a key prefix is matched literally.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Clone)]
pub struct RedisCacheBackend {
    conn: ConnectionManager,
    /// Prepended to every key, e.g. `sprint` gives `sprint:Event:<id>`.
    namespace: Option<String>,
}

impl RedisCacheBackend {
    /// Connect to `url` (`redis://host:port/db`).
    pub async fn connect(url: &str, namespace: Option<String>) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(unavailable)?;
        let conn = ConnectionManager::new(client).await.map_err(unavailable)?;
        Ok(Self { conn, namespace })
    }

    fn full_key(&self, key: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{}:{}", ns, key),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(self.full_key(key)).await.map_err(unavailable)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let key = self.full_key(key);
        match ttl {
            Some(ttl) => {
                let seconds = ttl.as_secs().max(1);
                let _: () = conn.set_ex(key, value, seconds).await.map_err(unavailable)?;
            }
            None => {
                let _: () = conn.set(key, value).await.map_err(unavailable)?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(self.full_key(key)).await.map_err(unavailable)?;
        Ok(removed > 0)
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let pattern = format!("{}*", escape_glob(&self.full_key(prefix)));
        let mut conn = self.conn.clone();

        let keys: Vec<String> = {
            let mut scan_conn = self.conn.clone();
            let mut iter = scan_conn
                .scan_match::<_, String>(pattern)
                .await
                .map_err(unavailable)?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        if keys.is_empty() {
            return Ok(0);
        }
        let removed: i64 = conn.del(keys).await.map_err(unavailable)?;
        Ok(removed.max(0) as u64)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("Event:"), "Event:");
        assert_eq!(escape_glob("a*b?[c]"), "a\\*b\\?\\[c\\]");
    }
}
