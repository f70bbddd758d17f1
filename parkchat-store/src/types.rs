//! Row types for the persistent session and message stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,
    /// Assistant (AI) response
    Assistant,
}

impl MessageRole {
    /// Convert to string representation for database storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse from string representation.
    pub fn parse(s: &str) -> Self {
        match s {
            "assistant" => Self::Assistant,
            _ => Self::User, // Default fallback
        }
    }
}

/// One logical conversation, as stored in the persistent session store.
///
/// At most one session per `user_id` may have `is_active = true` at any
/// instant; the store enforces this with a uniqueness constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Store-assigned identifier.
    pub id: String,
    /// Owning user. Immutable after creation.
    pub user_id: String,
    /// Municipality/tenant scope. Immutable after creation.
    pub prefecture_id: String,
    /// Externally-visible conversation handle.
    pub assistant_id: String,
    /// Whether this is the user's current conversation.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub inactivated_at: Option<DateTime<Utc>>,
}

/// Fields required to create a new session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: String,
    pub prefecture_id: String,
    pub assistant_id: String,
}

/// A persisted chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Store-assigned row id, monotonically increasing per store.
    pub id: i64,
    /// Session this message belongs to.
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Fields required to append a new message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
}
