//! Session resolution: reuse-vs-create for incoming messages.
//!
//! Decides whether a request continues an existing conversation or
//! starts a new one, keeping at most one active session per user. The
//! persistent session store is the source of truth; the session cache
//! is only a shortcut and is always verified against the store before
//! a cached identity is reused.

use crate::session_cache::SessionCache;
use crate::types::SessionCacheEntry;
use parkchat_common::{Error, Result};
use parkchat_store::{NewSession, Session, SessionStore};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Outcome of a successful resolution.
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub session: Session,
    /// The externally-visible conversation handle for the response:
    /// the caller-supplied id, the reused session's id, or a fresh one.
    pub assistant_id: String,
    pub is_new_session: bool,
}

/// Reuse-vs-create state machine over the persistent session store.
pub struct SessionResolver {
    sessions: Arc<dyn SessionStore>,
    cache: Arc<SessionCache>,
}

impl SessionResolver {
    pub fn new(sessions: Arc<dyn SessionStore>, cache: Arc<SessionCache>) -> Self {
        Self { sessions, cache }
    }

    /// Resolve the session for an incoming message.
    ///
    /// - With an `assistant_id`: reuse the active session matching
    ///   `(user, assistant)` if one exists.
    /// - Without one: resume the user's open conversation if any.
    /// - Otherwise inactivate the user's active sessions and create a
    ///   fresh one (generating an `assistant_id` when none was given).
    ///
    /// Store failures surface as `Err`; the caller turns them into a
    /// generic user-visible error. Cache failures never do.
    pub async fn resolve(
        &self,
        user_id: &str,
        prefecture_id: &str,
        assistant_id: Option<&str>,
    ) -> Result<SessionResult> {
        if let Some(assistant_id) = assistant_id {
            if let Some(session) = self.find_reusable(user_id, assistant_id).await? {
                info!(user_id, session_id = %session.id, "Reusing session for supplied assistant id");
                return Ok(SessionResult {
                    assistant_id: assistant_id.to_string(),
                    session,
                    is_new_session: false,
                });
            }
        } else if let Some(session) = self.active_session_for_user(user_id).await? {
            // A returning user without an explicit handle continues
            // their open conversation rather than forking a new one.
            info!(user_id, session_id = %session.id, "Resuming user's open session");
            return Ok(SessionResult {
                assistant_id: session.assistant_id.clone(),
                session,
                is_new_session: false,
            });
        }

        self.create(user_id, prefecture_id, assistant_id).await
    }

    /// Look up an active `(user, assistant)` session, consulting the
    /// session cache first as a shortcut.
    async fn find_reusable(&self, user_id: &str, assistant_id: &str) -> Result<Option<Session>> {
        if let Some(entry) = self.cache.get(user_id).await {
            if entry.assistant_id == assistant_id {
                // The cache is advisory: confirm against the store
                if let Some(session) = self.sessions.find_by_id(&entry.session_id).await? {
                    if session.is_active {
                        debug!(user_id, session_id = %session.id, "Session cache hit");
                        return Ok(Some(session));
                    }
                }
                debug!(user_id, "Session cache entry is stale");
            }
        }

        self.sessions
            .find_active_by_user_and_assistant(user_id, assistant_id)
            .await
    }

    /// The user's single active session, repairing the invariant if
    /// the store somehow holds more than one.
    async fn active_session_for_user(&self, user_id: &str) -> Result<Option<Session>> {
        let mut active = self.sessions.find_active_by_user(user_id).await?;
        if active.len() > 1 {
            error!(
                user_id,
                count = active.len(),
                "Invariant violation: multiple active sessions; keeping the newest"
            );
            for stale in &active[1..] {
                if let Err(e) = self.sessions.inactivate_session(&stale.id).await {
                    warn!(session_id = %stale.id, error = %e, "Failed to repair stale active session");
                }
            }
        }
        Ok(if active.is_empty() {
            None
        } else {
            Some(active.swap_remove(0))
        })
    }

    async fn create(
        &self,
        user_id: &str,
        prefecture_id: &str,
        assistant_id: Option<&str>,
    ) -> Result<SessionResult> {
        self.sessions.inactivate_all_for_user(user_id).await?;

        let assistant_id = assistant_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        // Bounded retry: either our insert wins or we adopt the row of
        // whichever concurrent resolver beat us to it.
        let mut last_conflict = None;
        for _ in 0..3 {
            match self
                .sessions
                .create_session(NewSession {
                    user_id: user_id.to_string(),
                    prefecture_id: prefecture_id.to_string(),
                    assistant_id: assistant_id.clone(),
                })
                .await
            {
                Ok(session) => {
                    info!(user_id, session_id = %session.id, "New session created");
                    return Ok(SessionResult {
                        assistant_id,
                        session,
                        is_new_session: true,
                    });
                }
                Err(e) if e.is_conflict() => {
                    warn!(user_id, "Concurrent session creation detected, reusing winner");
                    if let Some(session) = self.active_session_for_user(user_id).await? {
                        return Ok(SessionResult {
                            assistant_id: session.assistant_id.clone(),
                            session,
                            is_new_session: false,
                        });
                    }
                    // The winner was inactivated before we could read
                    // it; the slot is free again, so retry the insert.
                    last_conflict = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_conflict
            .unwrap_or_else(|| Error::Conflict(format!("user {user_id} session contention"))))
    }
}

/// Cache entry for a resolved session, written back after a turn.
pub fn cache_entry_for(
    result: &SessionResult,
    payload: crate::types::ChatPayload,
    prefecture_user_token: &str,
    user_token: &str,
) -> SessionCacheEntry {
    SessionCacheEntry {
        assistant_id: result.assistant_id.clone(),
        session_id: result.session.id.clone(),
        payload,
        prefecture_user_token: prefecture_user_token.to_string(),
        user_token: user_token.to_string(),
    }
}
