//! Context handed to the agent builder on a cache miss.

use parkchat_session::ChatPayload;
use serde::{Deserialize, Serialize};

/// Everything an agent builder needs to construct a handle for one
/// resolved session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    pub session_id: String,
    pub user_id: String,
    pub prefecture_id: String,
    /// Full request payload (municipality details, user identity).
    pub payload: ChatPayload,
    /// Tenant-scoped API token for municipality services.
    pub prefecture_user_token: String,
    /// End-user API token.
    pub user_token: String,
    /// Whether the session was created for this turn (no prior history).
    pub is_new_session: bool,
}
