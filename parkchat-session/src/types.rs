//! Request payload and cache projection types.

use chrono::{DateTime, Utc};
use parkchat_common::{Error, Result};
use parkchat_store::{MessageRole, StoredMessage};
use serde::{Deserialize, Serialize};

/// Structured request payload identifying the user and municipality.
///
/// Validated at the boundary; downstream components can rely on the
/// identifying fields being non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    /// Municipality/tenant identifier.
    pub prefecture_id: String,
    /// Short municipality code (e.g. "SP").
    #[serde(default)]
    pub prefecture_code: String,
    #[serde(default)]
    pub prefecture_name: String,
    /// IANA timezone of the municipality.
    #[serde(default)]
    pub prefecture_timezone: String,
    /// End-user identifier.
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub user_email: String,
    /// National identity document number.
    #[serde(default)]
    pub user_document: String,
}

impl ChatPayload {
    /// Validate the identifying fields.
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::InvalidInput("payload.user_id is required".into()));
        }
        if self.prefecture_id.trim().is_empty() {
            return Err(Error::InvalidInput(
                "payload.prefecture_id is required".into(),
            ));
        }
        Ok(())
    }
}

/// Denormalized, ephemeral projection of a session plus request-scoped
/// secrets, keyed by user in the cache store.
///
/// Not authoritative: a miss or a cache failure always falls back to
/// the persistent session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCacheEntry {
    pub assistant_id: String,
    pub session_id: String,
    pub payload: ChatPayload,
    pub prefecture_user_token: String,
    pub user_token: String,
}

/// A message as held in the sliding-window memory buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferedMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&StoredMessage> for BufferedMessage {
    fn from(msg: &StoredMessage) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
            timestamp: msg.created_at,
        }
    }
}

/// Bounded sliding window over a session's message log, oldest first.
///
/// Rebuilt in full from the persistent message store rather than
/// patched incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryBuffer {
    pub messages: Vec<BufferedMessage>,
    pub max_size: usize,
}

impl MemoryBuffer {
    /// An empty buffer with the given bound.
    pub fn empty(max_size: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_size,
        }
    }

    /// Build a buffer from stored messages, keeping only the most
    /// recent `max_size` entries.
    pub fn from_messages(messages: &[StoredMessage], max_size: usize) -> Self {
        let skip = messages.len().saturating_sub(max_size);
        Self {
            messages: messages[skip..].iter().map(BufferedMessage::from).collect(),
            max_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ChatPayload {
        ChatPayload {
            prefecture_id: "pref-1".into(),
            prefecture_code: "SP".into(),
            prefecture_name: "São Paulo".into(),
            prefecture_timezone: "America/Sao_Paulo".into(),
            user_id: "u1".into(),
            user_name: "Ana".into(),
            user_email: "ana@example.com".into(),
            user_document: "123".into(),
        }
    }

    #[test]
    fn test_payload_validate_ok() {
        assert!(payload().validate().is_ok());
    }

    #[test]
    fn test_payload_validate_rejects_blank_ids() {
        let mut p = payload();
        p.user_id = "  ".into();
        assert!(p.validate().is_err());

        let mut p = payload();
        p.prefecture_id = String::new();
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_payload_optional_fields_default() {
        let p: ChatPayload =
            serde_json::from_str(r#"{"prefecture_id": "p1", "user_id": "u1"}"#).unwrap();
        assert!(p.validate().is_ok());
        assert!(p.user_name.is_empty());
    }

    #[test]
    fn test_buffer_from_messages_keeps_newest_window() {
        let stored: Vec<StoredMessage> = (1..=5)
            .map(|i| StoredMessage {
                id: i,
                session_id: "s1".into(),
                role: MessageRole::User,
                content: format!("m{i}"),
                created_at: Utc::now(),
            })
            .collect();

        let buffer = MemoryBuffer::from_messages(&stored, 3);
        assert_eq!(buffer.messages.len(), 3);
        let contents: Vec<&str> = buffer.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4", "m5"]);
    }

    #[test]
    fn test_buffer_smaller_than_bound() {
        let stored = vec![StoredMessage {
            id: 1,
            session_id: "s1".into(),
            role: MessageRole::Assistant,
            content: "hi".into(),
            created_at: Utc::now(),
        }];
        let buffer = MemoryBuffer::from_messages(&stored, 10);
        assert_eq!(buffer.messages.len(), 1);
        assert_eq!(buffer.max_size, 10);
    }
}
