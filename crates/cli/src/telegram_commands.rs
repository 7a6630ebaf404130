use std::sync::Arc;

use {
    anyhow::{Context, Result},
    relay_config::RelayConfig,
    relay_telegram::TelegramBotConfig,
    secrecy::ExposeSecret,
    tokio_util::sync::CancellationToken,
    tracing::info,
};

use crate::app;

/// Run the Telegram bot until Ctrl-C.
pub async fn run(config: &RelayConfig) -> Result<()> {
    let token = config
        .telegram
        .token
        .as_ref()
        .context("telegram.token is not configured")?;
    let bot_config = TelegramBotConfig {
        chunk_size: config.telegram.chunk_size,
        max_attachment_bytes: config.attachments.max_bytes,
        ..TelegramBotConfig::new(token.expose_secret().clone())
    };

    let orchestrator = Arc::new(app::build_orchestrator(config)?);
    let ctx = relay_telegram::connect(bot_config, orchestrator).await?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
        }
        shutdown.cancel();
    });

    relay_telegram::run_polling(ctx, cancel).await?;
    Ok(())
}
