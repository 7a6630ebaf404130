use std::fmt;

use async_trait::async_trait;

use crate::Result;

/// Opaque reference to the placeholder message of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryHandle(String);

impl DeliveryHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Platform operations for one conversation.
///
/// Every call is independent; the orchestrator guarantees the ordering
/// placeholder → traces → update/delete → follow-ups.
#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    /// Post the "thinking" message that the final answer later replaces.
    async fn post_placeholder(&self, text: &str) -> Result<DeliveryHandle>;

    async fn update_placeholder(&self, handle: &DeliveryHandle, text: &str) -> Result<()>;

    async fn delete_placeholder(&self, handle: &DeliveryHandle) -> Result<()>;

    /// Post an additional message after the placeholder.
    async fn post_follow_up(&self, text: &str) -> Result<()>;

    /// Post a live reasoning or tool trace.
    async fn post_trace(&self, text: &str) -> Result<()>;

    /// Send a "typing" indicator. No-op by default.
    async fn send_typing(&self) -> Result<()> {
        Ok(())
    }

    /// Largest message the platform accepts, in characters.
    fn max_message_len(&self) -> usize;
}
