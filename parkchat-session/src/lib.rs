//! Parkchat Session - session resolution and conversational memory.
//!
//! Turns each incoming message into a session decision (reuse or
//! create, at most one active conversation per user) and maintains the
//! bounded sliding-window memory the assistant sees:
//! - [`SessionResolver`]: reuse-vs-create state machine over the
//!   persistent session store
//! - [`SessionCache`]: advisory per-user session-identity cache
//! - [`MessageBuffer`]: per-session message window with read-through
//!   cache and full-rebuild-on-append semantics

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod memory;
pub mod resolver;
pub mod session_cache;
pub mod types;

pub use memory::MessageBuffer;
pub use resolver::{cache_entry_for, SessionResolver, SessionResult};
pub use session_cache::SessionCache;
pub use types::{BufferedMessage, ChatPayload, MemoryBuffer, SessionCacheEntry};
