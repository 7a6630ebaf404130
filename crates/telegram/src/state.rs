use std::sync::Arc;

use relay_chat::ChatOrchestrator;

use crate::config::TelegramBotConfig;

/// Everything a message handler needs, shared across spawned handlers.
pub struct BotContext {
    pub bot: teloxide::Bot,
    /// Username reported by `getMe`, without the leading `@`.
    pub bot_username: Option<String>,
    pub orchestrator: Arc<ChatOrchestrator>,
    pub config: TelegramBotConfig,
}

impl BotContext {
    pub fn bot_username(&self) -> &str {
        self.bot_username.as_deref().unwrap_or_default()
    }
}
