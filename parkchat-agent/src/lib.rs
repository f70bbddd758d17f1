//! Parkchat Agent - agent handle lifecycle and the chat turn pipeline.
//!
//! Sits on top of the session and store crates:
//! - [`AgentHandle`] / [`AgentBuilder`]: the seam to the host's agent
//!   runtime
//! - [`AgentCache`]: in-process LRU of live handles, capacity- and
//!   idle-bounded
//! - [`ChatService`]: one-message-in, one-reply-out orchestration that
//!   never fails outward

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod cache;
pub mod context;
pub mod handle;
pub mod service;

pub use cache::{AgentCache, AgentCacheStats};
pub use context::AgentContext;
pub use handle::{AgentBuilder, AgentHandle};
pub use service::{ChatRequest, ChatResponse, ChatService};
