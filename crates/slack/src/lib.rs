//! Slack front-end.
//!
//! Receives events over Socket Mode, routes each message (reply, record as
//! context, ignore) and implements
//! [`DeliveryAdapter`](relay_channels::DeliveryAdapter) for a channel, with
//! traces and overflow chunks threaded under the reply.

pub mod api;
pub mod config;
pub mod error;
pub mod handlers;
pub mod outbound;
pub mod socket;
pub mod state;

pub use {
    api::{SlackApi, SlackProfile, WebApi},
    config::SlackBotConfig,
    error::{Error, Result},
    outbound::SlackDelivery,
    socket::{connect, run_socket_mode},
    state::SlackContext,
};
