//! Contracts for the remote collaborators the orchestrator talks to.
//!
//! [`crate::AgentEngineClient`] implements all three against the HTTP engine;
//! tests provide in-memory fakes.

use {
    async_trait::async_trait,
    futures::stream::BoxStream,
    relay_common::NormalizedPart,
    serde_json::{Map, Value},
};

use crate::{AgentEvent, Message, RemoteSession, Result};

/// Live events for one turn. An `Err` item that is
/// [event-local](crate::Error::is_event_local) may be followed by more events;
/// any other error ends the stream.
pub type EventStream = BoxStream<'static, Result<AgentEvent>>;

#[async_trait]
pub trait RemoteAgent: Send + Sync {
    async fn stream_turn(
        &self,
        external_user_id: &str,
        session_id: &str,
        message: &Message,
    ) -> Result<EventStream>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn list_sessions(&self, external_user_id: &str) -> Result<Vec<RemoteSession>>;

    /// Create a session and return its id.
    async fn create_session(&self, external_user_id: &str) -> Result<String>;

    async fn get_session(
        &self,
        external_user_id: &str,
        session_id: &str,
    ) -> Result<Option<RemoteSession>>;

    async fn delete_session(&self, external_user_id: &str, session_id: &str) -> Result<()>;

    /// Merge `delta` into the session state.
    async fn append_state_delta(
        &self,
        session_id: &str,
        external_user_id: &str,
        delta: Map<String, Value>,
    ) -> Result<()>;

    /// Record a message in the session history without running the agent.
    async fn append_message(
        &self,
        session_id: &str,
        external_user_id: &str,
        author: &str,
        parts: Vec<NormalizedPart>,
    ) -> Result<()>;
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn commit_session_to_memory(&self, session: &RemoteSession) -> Result<()>;
}
