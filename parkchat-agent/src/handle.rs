//! Agent handle and builder interfaces.
//!
//! A handle wraps whatever per-conversation agent runtime the host
//! wires in (prompt, tools, upstream model client). Construction is
//! the expensive part, which is why handles are cached per session.

use crate::context::AgentContext;
use async_trait::async_trait;
use parkchat_common::Result;
use parkchat_session::MemoryBuffer;
use std::sync::Arc;

/// A ready-to-invoke conversational agent bound to one session.
#[async_trait]
pub trait AgentHandle: Send + Sync {
    /// Run one turn: take the user's message, produce the reply.
    async fn invoke(&self, input: &str) -> Result<String>;
}

/// Factory for [`AgentHandle`]s.
///
/// Called on a cache miss with the resolved session context and the
/// current memory window, so a rebuilt handle starts with the
/// conversation history it missed.
#[async_trait]
pub trait AgentBuilder: Send + Sync {
    async fn build(&self, ctx: &AgentContext, history: &MemoryBuffer)
        -> Result<Arc<dyn AgentHandle>>;
}
