use {
    anyhow::Result,
    clap::Subcommand,
    relay_chat::{DeleteOutcome, SaveOutcome},
    relay_config::RelayConfig,
};

use crate::app;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Delete the conversation's newest remote session.
    Delete {
        /// Conversation identity, e.g. "Telegram: 42".
        conversation: String,
    },
    /// Turn the conversation's newest session into long-term memories.
    Save {
        /// Conversation identity, e.g. "Telegram: 42".
        conversation: String,
    },
}

pub async fn handle_sessions(action: SessionAction, config: &RelayConfig) -> Result<()> {
    let orchestrator = app::build_orchestrator(config)?;

    match action {
        SessionAction::Delete { conversation } => {
            let conversation = app::parse_conversation(&conversation);
            orchestrator.adopt_session(&conversation).await?;
            match orchestrator.delete_session(&conversation).await? {
                DeleteOutcome::Deleted => println!("Deleted session for {conversation}."),
                DeleteOutcome::NoActiveSession => {
                    println!("No session found for {conversation}.")
                },
            }
        },
        SessionAction::Save { conversation } => {
            let conversation = app::parse_conversation(&conversation);
            orchestrator.adopt_session(&conversation).await?;
            match orchestrator.save_session_to_memory(&conversation).await? {
                SaveOutcome::Saved => println!("Saved session for {conversation} to memory."),
                SaveOutcome::NoActiveSession => {
                    println!("No session found for {conversation}.")
                },
                SaveOutcome::SessionMissing => {
                    println!("The session for {conversation} no longer exists.")
                },
            }
        },
    }

    Ok(())
}
