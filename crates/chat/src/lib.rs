//! The reply pipeline: one inbound turn in, one delivered answer out.
//!
//! [`ChatOrchestrator`] resolves the conversation's remote session, streams
//! the agent's events through [`classify`] and [`ReplyState`], retries once on
//! a stale session and hands the result to a
//! [`DeliveryAdapter`](relay_channels::DeliveryAdapter).

pub mod accumulator;
pub mod classify;
pub mod error;
pub mod orchestrator;
pub mod retry;

pub use {
    accumulator::ReplyState,
    classify::{Classified, VALIDATOR_AUTHOR, classify},
    error::{Error, Result},
    orchestrator::{
        ChatOrchestrator, ChatSettings, DeleteOutcome, DeliveryOutcome, SaveOutcome, TurnRequest,
    },
    retry::{FaultAction, RetryController, RetryPhase},
};
