//! Parkchat Store - persistence layer for the Parkchat assistant backend.
//!
//! This crate provides the narrow interfaces to the authoritative and
//! advisory stores the conversation subsystem depends on:
//! - [`SessionStore`]: relational source of truth for session identity
//! - [`MessageStore`]: append-only per-session message log
//! - [`CacheStore`]: TTL-bound key-value cache (Redis or in-memory)
//!
//! Each interface ships a production backend (`SQLite`, Redis) and an
//! in-memory backend for local development and testing.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod cache;
pub mod message_store;
pub mod session_store;
pub mod types;

pub use cache::{CacheStore, MemoryCache, RedisCache};
pub use message_store::{MemoryMessageStore, MessageStore, SqliteMessageStore};
pub use session_store::{MemorySessionStore, SessionStore, SqliteSessionStore};
pub use types::{MessageRole, NewMessage, NewSession, Session, StoredMessage};
