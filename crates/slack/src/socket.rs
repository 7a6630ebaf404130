//! Socket Mode connection.
//!
//! Events arrive over a WebSocket opened with the app-level token, so no
//! public HTTP endpoint is needed.

use std::sync::Arc;

use {
    slack_morphism::prelude::*,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info},
};

use relay_chat::ChatOrchestrator;

use crate::{
    Result,
    api::WebApi,
    config::SlackBotConfig,
    error::Context,
    handlers::{self, InboundMessage},
    state::SlackContext,
};

fn hyper_client() -> Result<Arc<SlackHyperClient>> {
    let connector =
        SlackClientHyperConnector::new().context("failed to build slack https connector")?;
    Ok(Arc::new(SlackClient::new(connector)))
}

/// Authenticate the bot token and build the shared handler context.
pub async fn connect(
    config: SlackBotConfig,
    orchestrator: Arc<ChatOrchestrator>,
) -> Result<Arc<SlackContext>> {
    let client = hyper_client()?;
    let token = SlackApiToken::new(config.bot_token().to_string().into());

    let auth_test = client.open_session(&token).auth_test().await?;
    info!(bot_user = ?auth_test.user, "slack bot authenticated");

    Ok(Arc::new(SlackContext {
        api: Arc::new(WebApi::new(client, token)),
        bot_user_id: Some(auth_test.user_id.to_string()),
        orchestrator,
        config,
    }))
}

/// Listen for events until `cancel` fires.
///
/// Each message is handled on its own task so the event is acknowledged
/// right away and a slow agent turn never holds up other channels.
pub async fn run_socket_mode(ctx: Arc<SlackContext>, cancel: CancellationToken) -> Result<()> {
    let client = hyper_client()?;
    let app_token = SlackApiToken::new(ctx.config.app_token().to_string().into());

    let callbacks = SlackSocketModeListenerCallbacks::new().with_push_events(handle_push_events);
    let listener_env =
        Arc::new(SlackClientEventsListenerEnvironment::new(client).with_user_state(ctx));
    let listener = SlackClientSocketModeListener::new(
        &SlackClientSocketModeConfig::new(),
        listener_env,
        callbacks,
    );

    listener.listen_for(&app_token).await?;
    listener.start().await;
    info!("slack socket mode listening");

    cancel.cancelled().await;
    listener.shutdown().await;
    info!("slack socket mode stopped");
    Ok(())
}

async fn handle_push_events(
    event: SlackPushEventCallback,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ctx = {
        let guard = states.read().await;
        let ctx = guard
            .get_user_state::<Arc<SlackContext>>()
            .ok_or("missing slack context")?;
        Arc::clone(ctx)
    };

    let SlackEventCallbackBody::Message(message) = &event.event else {
        debug!("ignoring non-message slack event");
        return Ok(());
    };
    let Some(inbound) = inbound_message(message) else {
        debug!(subtype = ?message.subtype, "ignoring slack message subtype");
        return Ok(());
    };

    tokio::spawn(async move {
        let channel = inbound.channel.clone();
        if let Err(e) = handlers::handle_message(inbound, ctx).await {
            error!(channel = %channel, error = %e, "error handling slack message");
        }
    });
    Ok(())
}

/// Plain user and bot messages. Edits, joins, file shares and every other
/// subtype are dropped, as are events without a channel.
fn inbound_message(event: &SlackMessageEvent) -> Option<InboundMessage> {
    if event.subtype.is_some() {
        return None;
    }
    let channel = event.origin.channel.as_ref()?.to_string();
    Some(InboundMessage {
        channel,
        channel_type: event.origin.channel_type.as_ref().map(ToString::to_string),
        user: event.sender.user.as_ref().map(ToString::to_string),
        text: event
            .content
            .as_ref()
            .and_then(|c| c.text.clone())
            .unwrap_or_default(),
        ts: event.origin.ts.to_string(),
        thread_ts: event.origin.thread_ts.as_ref().map(ToString::to_string),
        from_bot: event.sender.bot_id.is_some(),
    })
}
