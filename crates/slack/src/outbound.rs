use std::sync::{Arc, OnceLock};

use {async_trait::async_trait, tracing::debug};

use relay_channels::{DeliveryAdapter, DeliveryHandle};

use crate::{api::SlackApi, config::SLACK_MAX_MESSAGE_LEN};

/// Delivers one turn's messages into a Slack channel.
///
/// The placeholder goes where the question was asked: into its thread when
/// it had one, otherwise top level. Traces and overflow chunks are threaded
/// under the placeholder.
pub struct SlackDelivery {
    api: Arc<dyn SlackApi>,
    channel: String,
    thread_ts: Option<String>,
    reply_ts: OnceLock<String>,
    chunk_size: usize,
}

impl SlackDelivery {
    pub fn new(api: Arc<dyn SlackApi>, channel: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            api,
            channel: channel.into(),
            thread_ts: None,
            reply_ts: OnceLock::new(),
            chunk_size: chunk_size.clamp(1, SLACK_MAX_MESSAGE_LEN),
        }
    }

    pub fn in_thread(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }

    /// Thread that traces and follow-ups go into.
    fn reply_thread(&self) -> Option<&str> {
        self.reply_ts
            .get()
            .map(String::as_str)
            .or(self.thread_ts.as_deref())
    }
}

#[async_trait]
impl DeliveryAdapter for SlackDelivery {
    async fn post_placeholder(&self, text: &str) -> relay_channels::Result<DeliveryHandle> {
        let ts = self
            .api
            .post_message(&self.channel, self.thread_ts.as_deref(), text)
            .await
            .map_err(|e| relay_channels::Error::external("slack placeholder", e))?;
        debug!(channel = %self.channel, ts = %ts, "posted placeholder");
        if self.reply_ts.set(ts.clone()).is_err() {
            debug!(channel = %self.channel, "placeholder posted twice; keeping the first thread");
        }
        Ok(DeliveryHandle::new(ts))
    }

    async fn update_placeholder(
        &self,
        handle: &DeliveryHandle,
        text: &str,
    ) -> relay_channels::Result<()> {
        self.api
            .update_message(&self.channel, handle.as_str(), text)
            .await
            .map_err(|e| relay_channels::Error::external("slack update", e))
    }

    async fn delete_placeholder(&self, handle: &DeliveryHandle) -> relay_channels::Result<()> {
        self.api
            .delete_message(&self.channel, handle.as_str())
            .await
            .map_err(|e| relay_channels::Error::external("slack delete", e))
    }

    async fn post_follow_up(&self, text: &str) -> relay_channels::Result<()> {
        self.api
            .post_message(&self.channel, self.reply_thread(), text)
            .await
            .map(|_| ())
            .map_err(|e| relay_channels::Error::external("slack send", e))
    }

    async fn post_trace(&self, text: &str) -> relay_channels::Result<()> {
        self.api
            .post_message(&self.channel, self.reply_thread(), text)
            .await
            .map(|_| ())
            .map_err(|e| relay_channels::Error::external("slack trace", e))
    }

    fn max_message_len(&self) -> usize {
        self.chunk_size
    }
}
