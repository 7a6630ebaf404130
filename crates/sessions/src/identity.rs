use std::fmt;

/// Stable key for a chat thread, e.g. `"Telegram: 123456"`.
///
/// The same string doubles as the external user id when talking to the
/// session store, so every chat owns its own remote sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationIdentity(String);

impl ConversationIdentity {
    pub fn new(platform: &str, chat_id: impl fmt::Display) -> Self {
        Self(format!("{platform}: {chat_id}"))
    }

    /// Wrap an identity string that is already in canonical form.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn external_user_id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
