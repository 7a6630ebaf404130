use std::sync::Arc;

use relay_chat::ChatOrchestrator;

use crate::{api::SlackApi, config::SlackBotConfig};

/// Everything a message handler needs, shared across spawned handlers.
pub struct SlackContext {
    pub api: Arc<dyn SlackApi>,
    /// User id of the bot, as reported by `auth.test`.
    pub bot_user_id: Option<String>,
    pub orchestrator: Arc<ChatOrchestrator>,
    pub config: SlackBotConfig,
}

impl SlackContext {
    pub fn bot_user_id(&self) -> &str {
        self.bot_user_id.as_deref().unwrap_or_default()
    }
}
