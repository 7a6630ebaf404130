//! Telegram front-end.
//!
//! Long-polls the Bot API with teloxide, routes each message (reply, record
//! as context, ignore), answers the session commands and implements
//! [`DeliveryAdapter`](relay_channels::DeliveryAdapter) for a chat.

pub mod bot;
pub mod config;
pub mod error;
pub mod handlers;
pub mod outbound;
pub mod render;
pub mod state;

pub use {
    bot::{connect, run_polling},
    config::TelegramBotConfig,
    error::{Error, Result},
    outbound::TelegramDelivery,
    state::BotContext,
};
