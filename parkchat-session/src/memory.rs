//! Sliding-window conversational memory, cached per session.
//!
//! Appends go through the persistent message store first (that write
//! is the only fatal one); the cached window is then rebuilt in full
//! by re-reading the most recent `max_size` messages. Conversations
//! are short and the window is small, so the redundant read is cheaper
//! to reason about than incremental patching and rules out buffer
//! drift entirely.

use crate::types::MemoryBuffer;
use parkchat_common::Result;
use parkchat_store::{CacheStore, MessageRole, MessageStore, NewMessage, StoredMessage};
use std::sync::Arc;
use tracing::{debug, warn};

const BUFFER_PREFIX: &str = "buffer:";

/// Per-session memory buffer backed by the message store, with an
/// advisory TTL-bound cache in front.
pub struct MessageBuffer {
    messages: Arc<dyn MessageStore>,
    cache: Arc<dyn CacheStore>,
    max_size: usize,
    ttl_secs: u64,
}

impl MessageBuffer {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        cache: Arc<dyn CacheStore>,
        max_size: usize,
        ttl_secs: u64,
    ) -> Self {
        Self {
            messages,
            cache,
            max_size,
            ttl_secs,
        }
    }

    /// The configured window bound.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn key(session_id: &str) -> String {
        format!("{BUFFER_PREFIX}{session_id}")
    }

    /// Persist a message, then rebuild the cached window.
    ///
    /// The append is authoritative and its failure fails the turn; a
    /// failed rebuild is logged and abandoned (the cache will be
    /// repopulated on the next append or read-through).
    pub async fn add_message(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<StoredMessage> {
        let message = self
            .messages
            .append(NewMessage {
                session_id: session_id.to_string(),
                role,
                content: content.to_string(),
            })
            .await?;

        if let Err(e) = self.rebuild(session_id).await {
            warn!(session_id, error = %e, "Abandoning memory buffer rebuild");
        }

        Ok(message)
    }

    /// Re-read the most recent `max_size` messages and overwrite the
    /// cached buffer, resetting its TTL.
    pub async fn rebuild(&self, session_id: &str) -> Result<()> {
        let recent = self.messages.get_recent(session_id, self.max_size).await?;
        let buffer = MemoryBuffer::from_messages(&recent, self.max_size);

        let value = serde_json::to_string(&buffer)?;
        match self
            .cache
            .set_with_ttl(&Self::key(session_id), &value, self.ttl_secs)
            .await
        {
            Ok(()) => debug!(session_id, size = buffer.messages.len(), "Memory buffer stored"),
            Err(e) => {
                // Advisory cache: the store read above stays authoritative
                warn!(session_id, error = %e, "Cache store unavailable for memory buffer write");
            }
        }
        Ok(())
    }

    /// The current window for a session.
    ///
    /// Serves from the cache when possible and falls back to an
    /// authoritative store read on a miss or a cache failure, so a
    /// dead cache store degrades latency, never correctness.
    pub async fn get(&self, session_id: &str) -> MemoryBuffer {
        match self.cache.get(&Self::key(session_id)).await {
            Ok(Some(value)) => match serde_json::from_str(&value) {
                Ok(buffer) => return buffer,
                Err(e) => {
                    warn!(session_id, error = %e, "Discarding unparseable memory buffer");
                }
            },
            Ok(None) => {}
            Err(e) => {
                warn!(session_id, error = %e, "Cache store unavailable for memory buffer read");
            }
        }

        match self.messages.get_recent(session_id, self.max_size).await {
            Ok(recent) => MemoryBuffer::from_messages(&recent, self.max_size),
            Err(e) => {
                warn!(session_id, error = %e, "Message store unavailable, serving empty buffer");
                MemoryBuffer::empty(self.max_size)
            }
        }
    }
}
