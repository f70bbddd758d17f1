//! Key-value cache store (Redis or in-memory).
//!
//! The cache store is advisory everywhere it is used: callers must
//! treat every operation as fallible and fall back to an authoritative
//! store on failure. Nothing in this module is a record of truth.

use async_trait::async_trait;
use parkchat_common::{CacheConfig, Error, Result};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Key-value cache store interface with TTL expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a value. `None` for a missing or expired key.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value with a time-to-live in seconds, replacing any
    /// existing value and resetting its TTL.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;
}

// ============================================================================
// Redis Backend
// ============================================================================

/// Redis cache store.
///
/// Uses a connection manager that reconnects automatically; individual
/// command failures surface as [`Error::Cache`] for the caller to absorb.
pub struct RedisCache {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisCache {
    /// Connect to Redis with the given configuration.
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| Error::Cache(e.to_string()))?;

        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::Cache(e.to_string()))?;

        Ok(Self {
            conn,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(self.prefixed(key))
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(|e| Error::Cache(e.to_string()))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SETEX")
            .arg(self.prefixed(key))
            .arg(ttl_secs)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| Error::Cache(e.to_string()))
    }
}

// ============================================================================
// In-Memory Backend
// ============================================================================

/// In-memory cache store for local development and testing.
///
/// Honors TTL expiry on read, so tests exercise the same expiration
/// behavior the Redis backend provides.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((value, deadline)) if Instant::now() < *deadline => Ok(Some(value.clone())),
            _ => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_cache_set_get() {
        let cache = MemoryCache::new();
        cache.set_with_ttl("k", "v", 60).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_cache_overwrite_resets_value() {
        let cache = MemoryCache::new();
        cache.set_with_ttl("k", "v1", 60).await.unwrap();
        cache.set_with_ttl("k", "v2", 60).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_cache_ttl_expiry() {
        let cache = MemoryCache::new();
        cache.set_with_ttl("k", "v", 10).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_cache_ttl_refresh_on_set() {
        let cache = MemoryCache::new();
        cache.set_with_ttl("k", "v", 10).await.unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set_with_ttl("k", "v", 10).await.unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
    }
}
