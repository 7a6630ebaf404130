use secrecy::{ExposeSecret, Secret};

use relay_channels::DEFAULT_CHUNK_SIZE;

/// Largest text message the Bot API accepts.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

/// Runtime settings for the bot.
#[derive(Clone)]
pub struct TelegramBotConfig {
    /// Bot token from @BotFather.
    pub token: Secret<String>,
    /// Chunk size for replies, capped at [`TELEGRAM_MAX_MESSAGE_LEN`].
    pub chunk_size: usize,
    /// Largest attachment downloaded from Telegram, in bytes.
    pub max_attachment_bytes: u64,
}

impl TelegramBotConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Secret::new(token.into()),
            chunk_size: TELEGRAM_MAX_MESSAGE_LEN,
            max_attachment_bytes: 20 * 1024 * 1024,
        }
    }

    /// Chunk size actually used for sends.
    pub fn effective_chunk_size(&self) -> usize {
        match self.chunk_size {
            0 => DEFAULT_CHUNK_SIZE,
            n => n.min(TELEGRAM_MAX_MESSAGE_LEN),
        }
    }

    pub(crate) fn token(&self) -> &str {
        self.token.expose_secret()
    }
}

impl std::fmt::Debug for TelegramBotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBotConfig")
            .field("token", &"[REDACTED]")
            .field("chunk_size", &self.chunk_size)
            .field("max_attachment_bytes", &self.max_attachment_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn debug_redacts_token() {
        let cfg = TelegramBotConfig::new("123:secret-token");
        let debug = format!("{cfg:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret-token"));
    }

    #[rstest]
    #[case(4096, 4096)]
    #[case(10_000, 4096)]
    #[case(1000, 1000)]
    #[case(0, DEFAULT_CHUNK_SIZE)]
    fn chunk_size_is_capped(#[case] configured: usize, #[case] expected: usize) {
        let cfg = TelegramBotConfig {
            chunk_size: configured,
            ..TelegramBotConfig::new("t")
        };
        assert_eq!(cfg.effective_chunk_size(), expected);
    }
}
