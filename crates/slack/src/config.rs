use secrecy::{ExposeSecret, Secret};

use relay_channels::DEFAULT_CHUNK_SIZE;

/// Longest `text` Slack accepts in one message.
pub const SLACK_MAX_MESSAGE_LEN: usize = 40_000;

/// Runtime settings for the Slack app.
#[derive(Clone)]
pub struct SlackBotConfig {
    /// Bot user OAuth token (`xoxb-…`), used for Web API calls.
    pub bot_token: Secret<String>,
    /// App-level token (`xapp-…`), used to open the Socket Mode connection.
    pub app_token: Secret<String>,
    pub chunk_size: usize,
}

impl SlackBotConfig {
    pub fn new(bot_token: impl Into<String>, app_token: impl Into<String>) -> Self {
        Self {
            bot_token: Secret::new(bot_token.into()),
            app_token: Secret::new(app_token.into()),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn effective_chunk_size(&self) -> usize {
        match self.chunk_size {
            0 => DEFAULT_CHUNK_SIZE,
            n => n,
        }
    }

    pub(crate) fn bot_token(&self) -> &str {
        self.bot_token.expose_secret()
    }

    pub(crate) fn app_token(&self) -> &str {
        self.app_token.expose_secret()
    }
}

impl std::fmt::Debug for SlackBotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackBotConfig")
            .field("bot_token", &"[REDACTED]")
            .field("app_token", &"[REDACTED]")
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}
