//! In-process LRU cache of agent handles, keyed by session id.
//!
//! Bounds live agent state two ways: a capacity cap (least recently
//! used handle evicted on overflow) and an idle TTL (handles untouched
//! for longer are swept on the next lookup). Eviction only drops the
//! in-process handle; conversation history lives in the stores and a
//! rebuilt handle picks it back up.

use crate::context::AgentContext;
use crate::handle::{AgentBuilder, AgentHandle};
use lru::LruCache;
use parkchat_common::Result;
use parkchat_session::MemoryBuffer;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

struct CachedHandle {
    handle: Arc<dyn AgentHandle>,
    created_at: Instant,
    last_used: Instant,
}

/// Snapshot of cache occupancy for logging and diagnostics.
#[derive(Debug, Clone)]
pub struct AgentCacheStats {
    pub size: usize,
    pub capacity: usize,
    pub idle_ttl_secs: u64,
    /// Seconds since the least recently used handle was touched.
    pub oldest_idle_secs: Option<u64>,
    /// Seconds since the most recently used handle was touched.
    pub newest_idle_secs: Option<u64>,
}

/// Capacity- and idle-bounded cache of [`AgentHandle`]s.
pub struct AgentCache {
    entries: Mutex<LruCache<String, CachedHandle>>,
    idle_ttl: Duration,
}

impl AgentCache {
    /// Create a cache with the given capacity and idle TTL.
    pub fn new(capacity: usize, idle_ttl_secs: u64) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            idle_ttl: Duration::from_secs(idle_ttl_secs),
        }
    }

    /// The cached handle for a session, building one on a miss.
    ///
    /// The build runs outside the cache lock so a slow construction
    /// never stalls other sessions. If another task cached a handle for
    /// the same session in the meantime, that one wins and the freshly
    /// built handle is dropped. Failed builds are never cached.
    pub async fn get_or_create<F>(
        &self,
        session_id: &str,
        build: F,
    ) -> Result<Arc<dyn AgentHandle>>
    where
        F: std::future::Future<Output = Result<Arc<dyn AgentHandle>>>,
    {
        {
            let mut entries = self.entries.lock().await;
            Self::sweep_idle(&mut entries, self.idle_ttl);

            if let Some(entry) = entries.get_mut(session_id) {
                entry.last_used = Instant::now();
                debug!(session_id, "Agent cache hit");
                return Ok(entry.handle.clone());
            }
        }

        debug!(session_id, "Agent cache miss, building handle");
        let handle = build.await?;

        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.get_mut(session_id) {
            // Lost the build race: keep the handle already in the cache
            existing.last_used = Instant::now();
            return Ok(existing.handle.clone());
        }

        if entries.len() == usize::from(entries.cap()) {
            if let Some((evicted, _)) = entries.pop_lru() {
                info!(session_id = %evicted, "Evicting least recently used agent handle");
            }
        }
        let now = Instant::now();
        entries.put(
            session_id.to_string(),
            CachedHandle {
                handle: handle.clone(),
                created_at: now,
                last_used: now,
            },
        );
        Ok(handle)
    }

    /// Build a handle through the configured [`AgentBuilder`].
    pub async fn get_or_build(
        &self,
        builder: &dyn AgentBuilder,
        ctx: &AgentContext,
        history: &MemoryBuffer,
    ) -> Result<Arc<dyn AgentHandle>> {
        self.get_or_create(&ctx.session_id, builder.build(ctx, history))
            .await
    }

    /// Drop the handle for a session, if cached.
    pub async fn remove(&self, session_id: &str) {
        let mut entries = self.entries.lock().await;
        if entries.pop(session_id).is_some() {
            debug!(session_id, "Agent handle removed from cache");
        }
    }

    /// Current occupancy snapshot.
    pub async fn stats(&self) -> AgentCacheStats {
        let mut entries = self.entries.lock().await;
        Self::sweep_idle(&mut entries, self.idle_ttl);

        let now = Instant::now();
        // LRU order tracks last_used, so the LRU end is the oldest
        let oldest = entries
            .peek_lru()
            .map(|(_, e)| now.duration_since(e.last_used).as_secs());
        let newest = entries
            .iter()
            .map(|(_, e)| now.duration_since(e.last_used).as_secs())
            .min();

        AgentCacheStats {
            size: entries.len(),
            capacity: usize::from(entries.cap()),
            idle_ttl_secs: self.idle_ttl.as_secs(),
            oldest_idle_secs: oldest,
            newest_idle_secs: newest,
        }
    }

    /// Pop idle-expired entries off the LRU end.
    ///
    /// Every hit refreshes `last_used` and promotes the entry, so LRU
    /// order and last-used order coincide and the expired entries form
    /// a prefix at the LRU end.
    fn sweep_idle(entries: &mut LruCache<String, CachedHandle>, idle_ttl: Duration) {
        let now = Instant::now();
        while let Some((_, entry)) = entries.peek_lru() {
            if now.duration_since(entry.last_used) <= idle_ttl {
                break;
            }
            if let Some((session_id, entry)) = entries.pop_lru() {
                warn!(
                    session_id = %session_id,
                    idle_secs = now.duration_since(entry.last_used).as_secs(),
                    lived_secs = now.duration_since(entry.created_at).as_secs(),
                    "Dropping idle agent handle"
                );
            }
        }
    }
}
