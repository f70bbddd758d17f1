//! Chat turn pipeline: resolve the session, run the agent, persist
//! the exchange.

use crate::cache::AgentCache;
use crate::context::AgentContext;
use crate::handle::AgentBuilder;
use chrono::{DateTime, Utc};
use parkchat_common::Result;
use parkchat_session::{
    cache_entry_for, ChatPayload, MessageBuffer, SessionCache, SessionResolver,
};
use parkchat_store::MessageRole;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// One incoming chat message with its identifying payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Conversation handle from a previous response, if the client
    /// wants to continue that conversation explicitly.
    #[serde(default)]
    pub assistant_id: Option<String>,
    pub payload: ChatPayload,
    #[serde(default)]
    pub prefecture_user_token: String,
    #[serde(default)]
    pub user_token: String,
}

/// The assistant's reply for one turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub message_date: DateTime<Utc>,
    /// Echo back so the client can address the same conversation.
    pub assistant_id: String,
    pub message_id: String,
}

const APOLOGY: &str =
    "Desculpe, não consegui processar sua mensagem agora. Tente novamente em instantes.";

/// Orchestrates a chat turn end to end.
pub struct ChatService {
    resolver: Arc<SessionResolver>,
    session_cache: Arc<SessionCache>,
    buffer: Arc<MessageBuffer>,
    agents: Arc<AgentCache>,
    builder: Arc<dyn AgentBuilder>,
}

impl ChatService {
    pub fn new(
        resolver: Arc<SessionResolver>,
        session_cache: Arc<SessionCache>,
        buffer: Arc<MessageBuffer>,
        agents: Arc<AgentCache>,
        builder: Arc<dyn AgentBuilder>,
    ) -> Self {
        Self {
            resolver,
            session_cache,
            buffer,
            agents,
            builder,
        }
    }

    /// Process one message. Never fails outward: any error becomes a
    /// generic apology so the user always gets a reply.
    pub async fn handle_message(&self, request: ChatRequest) -> ChatResponse {
        let assistant_id = request.assistant_id.clone();
        match self.process(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Chat turn failed, replying with generic apology");
                ChatResponse {
                    message: APOLOGY.to_string(),
                    message_date: Utc::now(),
                    assistant_id: assistant_id.unwrap_or_else(|| "error".to_string()),
                    message_id: Uuid::new_v4().to_string(),
                }
            }
        }
    }

    async fn process(&self, request: ChatRequest) -> Result<ChatResponse> {
        request.payload.validate()?;

        let resolved = self
            .resolver
            .resolve(
                &request.payload.user_id,
                &request.payload.prefecture_id,
                request.assistant_id.as_deref(),
            )
            .await?;
        let session_id = resolved.session.id.clone();

        // The user's message must be durably recorded before the agent
        // runs; losing it would corrupt the conversation record
        self.buffer
            .add_message(&session_id, MessageRole::User, &request.message)
            .await?;

        let history = self.buffer.get(&session_id).await;
        let ctx = AgentContext {
            session_id: session_id.clone(),
            user_id: request.payload.user_id.clone(),
            prefecture_id: request.payload.prefecture_id.clone(),
            payload: request.payload.clone(),
            prefecture_user_token: request.prefecture_user_token.clone(),
            user_token: request.user_token.clone(),
            is_new_session: resolved.is_new_session,
        };
        let agent = self
            .agents
            .get_or_build(self.builder.as_ref(), &ctx, &history)
            .await?;

        let reply = agent.invoke(&request.message).await?;

        // The reply already exists from the user's point of view; a
        // failed record keeps the turn alive and logs the gap
        let message_id = match self
            .buffer
            .add_message(&session_id, MessageRole::Assistant, &reply)
            .await
        {
            Ok(stored) => stored.id.to_string(),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to record assistant reply");
                Uuid::new_v4().to_string()
            }
        };

        self.session_cache
            .put(
                &request.payload.user_id.clone(),
                &cache_entry_for(
                    &resolved,
                    request.payload,
                    &request.prefecture_user_token,
                    &request.user_token,
                ),
            )
            .await;

        info!(
            session_id = %session_id,
            assistant_id = %resolved.assistant_id,
            new_session = resolved.is_new_session,
            "Chat turn completed"
        );

        Ok(ChatResponse {
            message: reply,
            message_date: Utc::now(),
            assistant_id: resolved.assistant_id,
            message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::AgentHandle;
    use async_trait::async_trait;
    use parkchat_common::Error;
    use parkchat_session::MemoryBuffer;
    use parkchat_store::{
        MemoryCache, MemoryMessageStore, MemorySessionStore, MessageStore, SessionStore,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoAgent;

    #[async_trait]
    impl AgentHandle for EchoAgent {
        async fn invoke(&self, input: &str) -> Result<String> {
            Ok(format!("echo: {input}"))
        }
    }

    /// Builder that counts constructions, for cache behavior tests.
    struct CountingBuilder {
        builds: AtomicUsize,
        fail: bool,
    }

    impl CountingBuilder {
        fn new() -> Self {
            Self {
                builds: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl AgentBuilder for CountingBuilder {
        async fn build(
            &self,
            _ctx: &AgentContext,
            _history: &MemoryBuffer,
        ) -> Result<Arc<dyn AgentHandle>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Agent("upstream down".into()));
            }
            Ok(Arc::new(EchoAgent))
        }
    }

    struct Harness {
        service: ChatService,
        sessions: Arc<MemorySessionStore>,
        messages: Arc<MemoryMessageStore>,
        builder: Arc<CountingBuilder>,
    }

    fn harness_with(builder: CountingBuilder) -> Harness {
        let sessions = Arc::new(MemorySessionStore::new());
        let messages = Arc::new(MemoryMessageStore::new());
        let cache_store = Arc::new(MemoryCache::new());
        let builder = Arc::new(builder);

        let session_cache = Arc::new(SessionCache::new(cache_store.clone(), 3600));
        let resolver = Arc::new(SessionResolver::new(sessions.clone(), session_cache.clone()));
        let buffer = Arc::new(parkchat_session::MessageBuffer::new(
            messages.clone(),
            cache_store,
            20,
            3600,
        ));
        let agents = Arc::new(AgentCache::new(50, 1800));

        Harness {
            service: ChatService::new(resolver, session_cache, buffer, agents, builder.clone()),
            sessions,
            messages,
            builder,
        }
    }

    fn request(user: &str, message: &str, assistant_id: Option<&str>) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            assistant_id: assistant_id.map(str::to_string),
            payload: ChatPayload {
                prefecture_id: "pref-1".into(),
                prefecture_code: "SP".into(),
                prefecture_name: "São Paulo".into(),
                prefecture_timezone: "America/Sao_Paulo".into(),
                user_id: user.into(),
                user_name: "Ana".into(),
                user_email: "ana@example.com".into(),
                user_document: "123".into(),
            },
            prefecture_user_token: "pt".into(),
            user_token: "ut".into(),
        }
    }

    #[tokio::test]
    async fn test_turn_records_both_messages_in_order() {
        let h = harness_with(CountingBuilder::new());

        let response = h.service.handle_message(request("u1", "hello", None)).await;
        assert_eq!(response.message, "echo: hello");
        assert!(!response.assistant_id.is_empty());

        let session = &h.sessions.find_active_by_user("u1").await.unwrap()[0];
        let log = h.messages.get_recent(&session.id, 10).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].role, MessageRole::User);
        assert_eq!(log[0].content, "hello");
        assert_eq!(log[1].role, MessageRole::Assistant);
        assert_eq!(log[1].content, "echo: hello");
    }

    #[tokio::test]
    async fn test_followup_turn_reuses_session_and_agent() {
        let h = harness_with(CountingBuilder::new());

        let first = h.service.handle_message(request("u1", "hi", None)).await;
        let second = h
            .service
            .handle_message(request("u1", "again", Some(&first.assistant_id)))
            .await;

        assert_eq!(second.assistant_id, first.assistant_id);
        assert_eq!(h.builder.builds.load(Ordering::SeqCst), 1, "agent was reused");

        let active = h.sessions.find_active_by_user("u1").await.unwrap();
        assert_eq!(active.len(), 1);
        let log = h.messages.get_recent(&active[0].id, 10).await.unwrap();
        assert_eq!(log.len(), 4);
    }

    #[tokio::test]
    async fn test_new_assistant_id_builds_fresh_agent() {
        let h = harness_with(CountingBuilder::new());

        let first = h.service.handle_message(request("u1", "hi", None)).await;
        h.service
            .handle_message(request("u1", "restart", Some("a-new")))
            .await;

        assert_ne!(first.assistant_id, "a-new");
        assert_eq!(h.builder.builds.load(Ordering::SeqCst), 2);
        // The old session was closed
        let active = h.sessions.find_active_by_user("u1").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].assistant_id, "a-new");
    }

    #[tokio::test]
    async fn test_invalid_payload_gets_apology() {
        let h = harness_with(CountingBuilder::new());

        let response = h.service.handle_message(request("", "hello", None)).await;
        assert_eq!(response.message, APOLOGY);
        assert_eq!(response.assistant_id, "error");
        assert_eq!(h.builder.builds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_build_gets_apology_and_preserves_assistant_id() {
        let mut builder = CountingBuilder::new();
        builder.fail = true;
        let h = harness_with(builder);

        let response = h
            .service
            .handle_message(request("u1", "hello", Some("a1")))
            .await;
        assert_eq!(response.message, APOLOGY);
        assert_eq!(response.assistant_id, "a1");
    }
}
