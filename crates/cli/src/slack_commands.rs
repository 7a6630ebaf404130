use std::sync::Arc;

use {
    anyhow::{Context, Result},
    relay_config::RelayConfig,
    relay_slack::SlackBotConfig,
    secrecy::ExposeSecret,
    tokio_util::sync::CancellationToken,
    tracing::info,
};

use crate::app;

/// Run the Slack app in Socket Mode until Ctrl-C.
pub async fn run(config: &RelayConfig) -> Result<()> {
    let bot_token = config
        .slack
        .bot_token
        .as_ref()
        .context("slack.bot_token is not configured")?;
    let app_token = config
        .slack
        .app_token
        .as_ref()
        .context("slack.app_token is not configured")?;
    let slack_config = SlackBotConfig {
        chunk_size: config.chat.chunk_size,
        ..SlackBotConfig::new(
            bot_token.expose_secret().clone(),
            app_token.expose_secret().clone(),
        )
    };

    let orchestrator = Arc::new(app::build_orchestrator(config)?);
    let ctx = relay_slack::connect(slack_config, orchestrator).await?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
        }
        shutdown.cancel();
    });

    relay_slack::run_socket_mode(ctx, cancel).await?;
    Ok(())
}
