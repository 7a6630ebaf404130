//! Remote agent engine: event model, outgoing message construction, the
//! collaborator contracts the orchestrator consumes, and an HTTP client that
//! implements them.

pub mod client;
pub mod error;
pub mod message;
pub mod model;
pub mod service;

pub use {
    client::AgentEngineClient,
    error::{Error, Result},
    message::{Message, Role, TurnUser, build, enrich_text},
    model::{AgentEvent, Part, RemoteSession},
    service::{EventStream, MemoryStore, RemoteAgent, SessionStore},
};
