//! Append-only persistent message log, one stream per session.

use crate::types::{MessageRole, NewMessage, StoredMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parkchat_common::{Error, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::RwLock;
use tracing::debug;

/// Persistent message store interface.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message to a session's log.
    async fn append(&self, new: NewMessage) -> Result<StoredMessage>;

    /// The most recent `limit` messages for a session, in chronological
    /// order (oldest first).
    async fn get_recent(&self, session_id: &str, limit: usize) -> Result<Vec<StoredMessage>>;
}

fn store_err(e: impl std::fmt::Display) -> Error {
    Error::Store(e.to_string())
}

// ============================================================================
// SQLite Backend
// ============================================================================

/// `SQLite` message store.
pub struct SqliteMessageStore {
    conn: Mutex<Connection>,
}

impl SqliteMessageStore {
    /// Create a new message store at the given database path.
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path).map_err(store_err)?;
        Self::init_schema(&conn)?;
        debug!(path = %db_path.display(), "Message store opened");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Initialize database schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id  TEXT NOT NULL,
                role        TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, created_at);",
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::Store(format!("Lock error: {e}")))
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn append(&self, new: NewMessage) -> Result<StoredMessage> {
        let conn = self.lock()?;
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO messages (session_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                new.session_id,
                new.role.as_str(),
                new.content,
                created_at.to_rfc3339(),
            ],
        )
        .map_err(store_err)?;

        Ok(StoredMessage {
            id: conn.last_insert_rowid(),
            session_id: new.session_id,
            role: new.role,
            content: new.content,
            created_at,
        })
    }

    async fn get_recent(&self, session_id: &str, limit: usize) -> Result<Vec<StoredMessage>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, session_id, role, content, created_at FROM messages
                 WHERE session_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2",
            )
            .map_err(store_err)?;

        let rows = stmt
            .query_map(params![session_id, limit as i64], |row| {
                let role: String = row.get(2)?;
                let created_at: String = row.get(4)?;
                Ok(StoredMessage {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    role: MessageRole::parse(&role),
                    content: row.get(3)?,
                    created_at: parse_timestamp(&created_at),
                })
            })
            .map_err(store_err)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row.map_err(store_err)?);
        }
        messages.reverse(); // newest-first query -> chronological order
        Ok(messages)
    }
}

// ============================================================================
// In-Memory Backend
// ============================================================================

/// In-memory message store for local development and testing.
#[derive(Default)]
pub struct MemoryMessageStore {
    messages: RwLock<Vec<StoredMessage>>,
}

impl MemoryMessageStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(&self, new: NewMessage) -> Result<StoredMessage> {
        let mut messages = self.messages.write().await;
        let message = StoredMessage {
            id: messages.len() as i64 + 1,
            session_id: new.session_id,
            role: new.role,
            content: new.content,
            created_at: Utc::now(),
        };
        messages.push(message.clone());
        Ok(message)
    }

    async fn get_recent(&self, session_id: &str, limit: usize) -> Result<Vec<StoredMessage>> {
        let messages = self.messages.read().await;
        let mut recent: Vec<StoredMessage> = messages
            .iter()
            .rev()
            .filter(|m| m.session_id == session_id)
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }
}
