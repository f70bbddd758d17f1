//! Persistent session store: source of truth for session identity.
//!
//! The store, not any cache, enforces the one-active-session-per-user
//! invariant. The `SQLite` backend does this with a partial unique
//! index; a losing concurrent insert surfaces as [`Error::Conflict`]
//! so the resolver can converge on the winner's session.

use crate::types::{NewSession, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parkchat_common::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Relational session store interface.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// All active sessions for a user, newest first.
    ///
    /// Returns a sequence rather than a single row so callers can
    /// detect and repair invariant violations (more than one active).
    async fn find_active_by_user(&self, user_id: &str) -> Result<Vec<Session>>;

    /// The active session matching `(user_id, assistant_id)`, if any.
    async fn find_active_by_user_and_assistant(
        &self,
        user_id: &str,
        assistant_id: &str,
    ) -> Result<Option<Session>>;

    /// Look up a session by id.
    async fn find_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Create a new active session.
    ///
    /// Fails with [`Error::Conflict`] if the user already has an active
    /// session (uniqueness constraint).
    async fn create_session(&self, new: NewSession) -> Result<Session>;

    /// Mark every active session for the user inactive. Idempotent.
    async fn inactivate_all_for_user(&self, user_id: &str) -> Result<()>;

    /// Mark a single session inactive. Idempotent. Used by invariant repair.
    async fn inactivate_session(&self, id: &str) -> Result<()>;
}

fn store_err(e: impl std::fmt::Display) -> Error {
    Error::Store(e.to_string())
}

// ============================================================================
// SQLite Backend
// ============================================================================

/// `SQLite` session store.
///
/// The partial unique index on `(user_id) WHERE is_active = 1` is the
/// store-level enforcement of the single-active-session invariant.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Create a new session store at the given database path.
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path).map_err(store_err)?;
        Self::init_schema(&conn)?;
        debug!(path = %db_path.display(), "Session store opened");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Initialize database schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL,
                prefecture_id   TEXT NOT NULL,
                assistant_id    TEXT NOT NULL,
                is_active       INTEGER NOT NULL,
                created_at      TEXT NOT NULL,
                inactivated_at  TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_one_active
                ON sessions(user_id) WHERE is_active = 1;",
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::Store(format!("Lock error: {e}")))
    }

    fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
        let created_at: String = row.get(5)?;
        let inactivated_at: Option<String> = row.get(6)?;
        Ok(Session {
            id: row.get(0)?,
            user_id: row.get(1)?,
            prefecture_id: row.get(2)?,
            assistant_id: row.get(3)?,
            is_active: row.get::<_, i64>(4)? != 0,
            created_at: parse_timestamp(&created_at),
            inactivated_at: inactivated_at.as_deref().map(parse_timestamp),
        })
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

const SESSION_COLUMNS: &str =
    "id, user_id, prefecture_id, assistant_id, is_active, created_at, inactivated_at";

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn find_active_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE user_id = ?1 AND is_active = 1
                 ORDER BY created_at DESC, rowid DESC"
            ))
            .map_err(store_err)?;

        let rows = stmt
            .query_map(params![user_id], Self::row_to_session)
            .map_err(store_err)?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row.map_err(store_err)?);
        }
        Ok(sessions)
    }

    async fn find_active_by_user_and_assistant(
        &self,
        user_id: &str,
        assistant_id: &str,
    ) -> Result<Option<Session>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE user_id = ?1 AND assistant_id = ?2 AND is_active = 1"
            ),
            params![user_id, assistant_id],
            Self::row_to_session,
        )
        .optional()
        .map_err(store_err)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Session>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
            params![id],
            Self::row_to_session,
        )
        .optional()
        .map_err(store_err)
    }

    async fn create_session(&self, new: NewSession) -> Result<Session> {
        let conn = self.lock()?;
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            prefecture_id: new.prefecture_id,
            assistant_id: new.assistant_id,
            is_active: true,
            created_at: Utc::now(),
            inactivated_at: None,
        };

        let result = conn.execute(
            "INSERT INTO sessions (id, user_id, prefecture_id, assistant_id, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            params![
                session.id,
                session.user_id,
                session.prefecture_id,
                session.assistant_id,
                session.created_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(session),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::Conflict(format!(
                    "user {} already has an active session",
                    session.user_id
                )))
            }
            Err(e) => Err(store_err(e)),
        }
    }

    async fn inactivate_all_for_user(&self, user_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE sessions SET is_active = 0, inactivated_at = ?2
             WHERE user_id = ?1 AND is_active = 1",
            params![user_id, Utc::now().to_rfc3339()],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn inactivate_session(&self, id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE sessions SET is_active = 0, inactivated_at = ?2
             WHERE id = ?1 AND is_active = 1",
            params![id, Utc::now().to_rfc3339()],
        )
        .map_err(store_err)?;
        Ok(())
    }
}

// ============================================================================
// In-Memory Backend
// ============================================================================

/// In-memory session store for local development and testing.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<Vec<Session>>,
}

impl MemorySessionStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn find_active_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().await;
        let mut active: Vec<Session> = sessions
            .iter()
            .filter(|s| s.user_id == user_id && s.is_active)
            .cloned()
            .collect();
        active.reverse(); // insertion order -> newest first
        Ok(active)
    }

    async fn find_active_by_user_and_assistant(
        &self,
        user_id: &str,
        assistant_id: &str,
    ) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .iter()
            .find(|s| s.user_id == user_id && s.assistant_id == assistant_id && s.is_active)
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn create_session(&self, new: NewSession) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        if sessions.iter().any(|s| s.user_id == new.user_id && s.is_active) {
            return Err(Error::Conflict(format!(
                "user {} already has an active session",
                new.user_id
            )));
        }

        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            prefecture_id: new.prefecture_id,
            assistant_id: new.assistant_id,
            is_active: true,
            created_at: Utc::now(),
            inactivated_at: None,
        };
        sessions.push(session.clone());
        Ok(session)
    }

    async fn inactivate_all_for_user(&self, user_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        for session in sessions.iter_mut() {
            if session.user_id == user_id && session.is_active {
                session.is_active = false;
                session.inactivated_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn inactivate_session(&self, id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.iter_mut().find(|s| s.id == id && s.is_active) {
            session.is_active = false;
            session.inactivated_at = Some(Utc::now());
        }
        Ok(())
    }
}
