use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result, bail},
    clap::Args,
    relay_agents::TurnUser,
    relay_chat::{DeliveryOutcome, TurnRequest},
    relay_common::AttachedFile,
    relay_config::RelayConfig,
    tracing::info,
};

use crate::{app, terminal::TerminalDelivery};

#[derive(Args)]
pub struct AskArgs {
    /// Conversation to continue. Bare ids are scoped to the CLI; pass a full
    /// identity such as "Telegram: 42" to join a bot conversation.
    #[arg(long, default_value = "default")]
    conversation: String,
    /// Display name of the sender.
    #[arg(long)]
    user: Option<String>,
    /// File to attach (repeatable).
    #[arg(long = "attach", value_name = "PATH")]
    attachments: Vec<PathBuf>,
    /// Print tool calls and responses as they happen.
    #[arg(long)]
    show_tools: bool,
    /// Message text.
    #[arg(required = true, num_args = 1..)]
    text: Vec<String>,
}

pub async fn handle_ask(args: AskArgs, config: &RelayConfig) -> Result<()> {
    let orchestrator = app::build_orchestrator(config)?;

    let mut attachments = Vec::with_capacity(args.attachments.len());
    for path in &args.attachments {
        attachments.push(read_attachment(path).await?);
    }

    let turn = TurnRequest {
        conversation: app::parse_conversation(&args.conversation),
        user: args.user.as_deref().map(cli_user),
        text: args.text.join(" "),
        attachments,
        show_tools: args.show_tools || config.chat.show_tools,
    };
    let delivery = TerminalDelivery::stdio(config.chat.chunk_size);

    match orchestrator.handle_turn(turn, &delivery).await {
        DeliveryOutcome::Delivered { chunks } => {
            info!(chunks, "answer delivered");
            Ok(())
        },
        DeliveryOutcome::Discarded => {
            eprintln!("The agent returned no answer.");
            Ok(())
        },
        DeliveryOutcome::Aborted | DeliveryOutcome::DeliveryFailed => {
            bail!("could not write the answer to the terminal")
        },
    }
}

async fn read_attachment(path: &Path) -> Result<AttachedFile> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read attachment {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let hint = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase());
    Ok(AttachedFile::new(name, hint, content))
}

fn cli_user(name: &str) -> TurnUser {
    TurnUser {
        id: name.to_string(),
        display_name: name.to_string(),
        email: None,
        personal_identity: format!("CLI: {name}"),
    }
}
