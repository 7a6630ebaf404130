//! Front-end side of a turn.
//!
//! Each chat platform (Telegram, Slack, the terminal) implements
//! [`DeliveryAdapter`] for one conversation; the orchestrator only ever talks
//! to that trait. Routing decides whether an inbound message gets a reply at
//! all.

pub mod chunk;
pub mod delivery;
pub mod error;
pub mod gating;

pub use {
    chunk::{DEFAULT_CHUNK_SIZE, chunk_text},
    delivery::{DeliveryAdapter, DeliveryHandle},
    error::{Error, Result},
    gating::{ChatKind, InboundRoute, mentions_bot, route_inbound},
};
