//! Conversation → remote session mapping.
//!
//! The [`SessionCache`] is the only state shared between concurrent turns.
//! Each conversation gets its own lock slot so lookups for one chat never wait
//! on another chat's remote calls.

pub mod cache;
pub mod error;
pub mod identity;

pub use {
    cache::{SessionCache, SessionRecord},
    error::{Error, Result},
    identity::ConversationIdentity,
};
