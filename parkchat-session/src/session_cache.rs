//! Advisory session-identity cache, keyed by user.
//!
//! Lets a returning user resume a conversation without a relational
//! lookup every turn. Best-effort only: `put` never fails outward and
//! `get` degrades to a miss, because the persistent session store is
//! the record of truth underneath.

use crate::types::SessionCacheEntry;
use parkchat_store::CacheStore;
use std::sync::Arc;
use tracing::{debug, warn};

const SESSION_CACHE_PREFIX: &str = "session:";

/// Redis-backed cache of [`SessionCacheEntry`] keyed by user id.
pub struct SessionCache {
    store: Arc<dyn CacheStore>,
    ttl_secs: u64,
}

impl SessionCache {
    /// Create a cache writing through the given store with the given TTL.
    pub fn new(store: Arc<dyn CacheStore>, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }

    fn key(user_id: &str) -> String {
        format!("{SESSION_CACHE_PREFIX}{user_id}")
    }

    /// Store the entry for a user, refreshing its TTL.
    ///
    /// Cache-store failures are logged and absorbed; the next `get`
    /// miss simply forces a fallback read from the session store.
    pub async fn put(&self, user_id: &str, entry: &SessionCacheEntry) {
        let value = match serde_json::to_string(entry) {
            Ok(value) => value,
            Err(e) => {
                warn!(user_id, error = %e, "Failed to serialize session cache entry");
                return;
            }
        };

        match self.store.set_with_ttl(&Self::key(user_id), &value, self.ttl_secs).await {
            Ok(()) => debug!(user_id, "Session cache stored"),
            Err(e) => {
                warn!(user_id, error = %e, "Cache store unavailable for session cache write");
            }
        }
    }

    /// Fetch the entry for a user. Any failure reads as a miss.
    pub async fn get(&self, user_id: &str) -> Option<SessionCacheEntry> {
        let value = match self.store.get(&Self::key(user_id)).await {
            Ok(value) => value?,
            Err(e) => {
                warn!(user_id, error = %e, "Cache store unavailable for session cache read");
                return None;
            }
        };

        match serde_json::from_str(&value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(user_id, error = %e, "Discarding unparseable session cache entry");
                None
            }
        }
    }
}
