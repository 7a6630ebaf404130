use std::{sync::Arc, time::Duration};

use {
    teloxide::{
        prelude::*,
        types::{AllowedUpdate, BotCommand, UpdateKind},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use relay_chat::ChatOrchestrator;

use crate::{
    Error, Result,
    config::TelegramBotConfig,
    handlers::{self, Command},
    state::BotContext,
};

/// Long-poll timeout passed to `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u32 = 30;

/// Pause after a failed `getUpdates` call.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Connect the bot and build the shared handler context.
pub async fn connect(
    config: TelegramBotConfig,
    orchestrator: Arc<ChatOrchestrator>,
) -> Result<Arc<BotContext>> {
    // The HTTP timeout must outlast the long poll or every idle poll errors.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(POLL_TIMEOUT_SECS) + 15))
        .build()?;
    let bot = Bot::with_client(config.token(), client);

    let me = bot.get_me().await?;
    let bot_username = me.username.clone();

    // Long polling is refused while a webhook is set.
    bot.delete_webhook().send().await?;

    let commands: Vec<BotCommand> = Command::ALL
        .into_iter()
        .map(|c| BotCommand::new(c.name(), c.description()))
        .collect();
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!(error = %e, "failed to register bot commands");
    }

    info!(username = ?bot_username, "telegram bot connected (webhook cleared)");

    Ok(Arc::new(BotContext {
        bot,
        bot_username,
        orchestrator,
        config,
    }))
}

/// Poll for updates until `cancel` fires.
///
/// Each message is handled on its own task so a slow agent turn never holds
/// up other chats. Returns an error when another process is polling with the
/// same token.
pub async fn run_polling(ctx: Arc<BotContext>, cancel: CancellationToken) -> Result<()> {
    info!("starting telegram polling loop");
    let mut offset: i32 = 0;

    loop {
        let request = ctx
            .bot
            .get_updates()
            .offset(offset)
            .timeout(POLL_TIMEOUT_SECS)
            .allowed_updates(vec![AllowedUpdate::Message]);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("telegram polling stopped");
                return Ok(());
            },
            result = request.send() => result,
        };

        match result {
            Ok(updates) => {
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    offset = update.id.as_offset();
                    match update.kind {
                        UpdateKind::Message(msg) => {
                            let ctx = Arc::clone(&ctx);
                            tokio::spawn(async move {
                                let chat_id = msg.chat.id.0;
                                if let Err(e) = handlers::handle_message(msg, ctx).await {
                                    error!(chat_id, error = %e, "error handling telegram message");
                                }
                            });
                        },
                        other => {
                            debug!("ignoring non-message update: {other:?}");
                        },
                    }
                }
            },
            Err(e) => {
                let e = Error::from(e);
                if e.is_polling_conflict() {
                    warn!("another instance is already polling with this token");
                    return Err(e);
                }
                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {},
                }
            },
        }
    }
}
