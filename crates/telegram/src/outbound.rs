use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    teloxide::{
        ApiError, RequestError,
        payloads::{EditMessageTextSetters, SendMessageSetters},
        prelude::*,
        types::{ChatAction, ChatId, MessageId, ParseMode, ReplyParameters},
    },
    tracing::{debug, warn},
};

use relay_channels::{DeliveryAdapter, DeliveryHandle};

use crate::{config::TELEGRAM_MAX_MESSAGE_LEN, render};

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Delivers one turn's messages into a Telegram chat.
///
/// The placeholder and every follow-up quote the inbound message when
/// `reply_to` is set, so answers stay attached to questions in busy groups.
pub struct TelegramDelivery {
    bot: Bot,
    chat_id: ChatId,
    reply_to: Option<MessageId>,
    chunk_size: usize,
}

impl TelegramDelivery {
    pub fn new(bot: Bot, chat_id: ChatId, chunk_size: usize) -> Self {
        Self {
            bot,
            chat_id,
            reply_to: None,
            chunk_size: chunk_size.clamp(1, TELEGRAM_MAX_MESSAGE_LEN),
        }
    }

    pub fn replying_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    fn reply_params(&self) -> Option<ReplyParameters> {
        self.reply_to
            .map(|id| ReplyParameters::new(id).allow_sending_without_reply())
    }

    /// Send `text` as HTML, falling back to plain text when Telegram rejects
    /// the markup or the rendered form no longer fits.
    async fn send_with_fallback(&self, text: &str) -> Result<MessageId, RequestError> {
        let chat_id = self.chat_id;
        let reply_params = self.reply_params();

        if let Some(html) = html_within_limit(text) {
            let result = with_retry_after(chat_id, "send message (html)", || {
                let mut req = self
                    .bot
                    .send_message(chat_id, html.as_str())
                    .parse_mode(ParseMode::Html);
                if let Some(rp) = &reply_params {
                    req = req.reply_parameters(rp.clone());
                }
                async move { req.await }
            })
            .await;
            match result {
                Ok(message) => return Ok(message.id),
                Err(e) => warn!(
                    chat_id = chat_id.0,
                    error = %e,
                    "telegram HTML send failed, retrying as plain text"
                ),
            }
        }

        let message = with_retry_after(chat_id, "send message (plain)", || {
            let mut req = self.bot.send_message(chat_id, text);
            if let Some(rp) = &reply_params {
                req = req.reply_parameters(rp.clone());
            }
            async move { req.await }
        })
        .await?;
        Ok(message.id)
    }

    async fn edit_with_fallback(
        &self,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), RequestError> {
        let chat_id = self.chat_id;

        if let Some(html) = html_within_limit(text) {
            let result = with_retry_after(chat_id, "edit message (html)", || {
                let req = self
                    .bot
                    .edit_message_text(chat_id, message_id, html.as_str())
                    .parse_mode(ParseMode::Html);
                async move { req.await }
            })
            .await;
            match result {
                Ok(_) => return Ok(()),
                Err(e) if is_message_not_modified_error(&e) => return Ok(()),
                Err(e) => warn!(
                    chat_id = chat_id.0,
                    error = %e,
                    "telegram HTML edit failed, retrying as plain text"
                ),
            }
        }

        match with_retry_after(chat_id, "edit message (plain)", || {
            let req = self.bot.edit_message_text(chat_id, message_id, text);
            async move { req.await }
        })
        .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_message_not_modified_error(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl DeliveryAdapter for TelegramDelivery {
    async fn post_placeholder(&self, text: &str) -> relay_channels::Result<DeliveryHandle> {
        let id = self
            .send_with_fallback(text)
            .await
            .map_err(|e| relay_channels::Error::external("telegram placeholder", e))?;
        debug!(chat_id = self.chat_id.0, message_id = id.0, "posted placeholder");
        Ok(DeliveryHandle::new(id.0.to_string()))
    }

    async fn update_placeholder(
        &self,
        handle: &DeliveryHandle,
        text: &str,
    ) -> relay_channels::Result<()> {
        let message_id = parse_handle(handle)?;
        self.edit_with_fallback(message_id, text)
            .await
            .map_err(|e| relay_channels::Error::external("telegram edit", e))
    }

    async fn delete_placeholder(&self, handle: &DeliveryHandle) -> relay_channels::Result<()> {
        let message_id = parse_handle(handle)?;
        let chat_id = self.chat_id;
        with_retry_after(chat_id, "delete message", || {
            let req = self.bot.delete_message(chat_id, message_id);
            async move { req.await }
        })
        .await
        .map(|_| ())
        .map_err(|e| relay_channels::Error::external("telegram delete", e))
    }

    async fn post_follow_up(&self, text: &str) -> relay_channels::Result<()> {
        self.send_with_fallback(text)
            .await
            .map(|_| ())
            .map_err(|e| relay_channels::Error::external("telegram send", e))
    }

    async fn post_trace(&self, text: &str) -> relay_channels::Result<()> {
        self.send_with_fallback(text)
            .await
            .map(|_| ())
            .map_err(|e| relay_channels::Error::external("telegram trace", e))
    }

    async fn send_typing(&self) -> relay_channels::Result<()> {
        self.bot
            .send_chat_action(self.chat_id, ChatAction::Typing)
            .await
            .map(|_| ())
            .map_err(|e| relay_channels::Error::external("telegram typing", e))
    }

    fn max_message_len(&self) -> usize {
        self.chunk_size
    }
}

/// Run a Bot API request, sleeping through `RetryAfter` responses.
async fn with_retry_after<T, F, Fut>(
    chat_id: ChatId,
    operation: &'static str,
    mut request: F,
) -> Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let mut retries = 0usize;

    loop {
        match request().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let Some(wait) = retry_after_duration(&err) else {
                    return Err(err);
                };

                if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                    warn!(
                        chat_id = chat_id.0,
                        operation,
                        retries,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limit persisted after retries"
                    );
                    return Err(err);
                }

                retries += 1;
                warn!(
                    chat_id = chat_id.0,
                    operation,
                    retries,
                    max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                    retry_after_secs = wait.as_secs(),
                    "telegram rate limited, waiting before retry"
                );
                tokio::time::sleep(wait).await;
            },
        }
    }
}

fn parse_handle(handle: &DeliveryHandle) -> relay_channels::Result<MessageId> {
    handle
        .as_str()
        .parse::<i32>()
        .map(MessageId)
        .map_err(|_| {
            relay_channels::Error::invalid_input(format!("not a telegram message id: {handle}"))
        })
}

/// Rendered HTML for `text`, unless it would exceed the message limit.
fn html_within_limit(text: &str) -> Option<String> {
    let html = render::to_telegram_html(text);
    (html.chars().count() <= TELEGRAM_MAX_MESSAGE_LEN).then_some(html)
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

fn is_message_not_modified_error(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::MessageNotModified))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        mockito::{Matcher, Server, ServerGuard},
        serde_json::json,
    };

    fn sent_message(id: i32, text: &str) -> String {
        json!({
            "ok": true,
            "result": {
                "message_id": id,
                "date": 1,
                "chat": { "id": 42, "type": "private", "first_name": "Alice" },
                "text": text
            }
        })
        .to_string()
    }

    fn delivery(server: &ServerGuard) -> TelegramDelivery {
        let api_url = reqwest::Url::parse(&server.url()).expect("parse api url");
        let bot = Bot::new("test-token").set_api_url(api_url);
        TelegramDelivery::new(bot, ChatId(42), 4096)
    }

    #[tokio::test]
    async fn placeholder_handle_is_the_message_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/bottest-token/SendMessage")
            .match_body(Matcher::PartialJson(json!({
                "chat_id": 42,
                "text": "🧠 Thinking...",
                "parse_mode": "HTML"
            })))
            .with_header("content-type", "application/json")
            .with_body(sent_message(7, "🧠 Thinking..."))
            .create_async()
            .await;

        let handle = delivery(&server)
            .post_placeholder("🧠 Thinking...")
            .await
            .unwrap();

        assert_eq!(handle.as_str(), "7");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_markup_falls_back_to_plain_text() {
        let mut server = Server::new_async().await;
        let html = server
            .mock("POST", "/bottest-token/SendMessage")
            .match_body(Matcher::PartialJson(json!({
                "text": "<b>hi</b>",
                "parse_mode": "HTML"
            })))
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "ok": false,
                    "error_code": 400,
                    "description": "Bad Request: can't parse entities: unsupported start tag"
                })
                .to_string(),
            )
            .create_async()
            .await;
        let plain = server
            .mock("POST", "/bottest-token/SendMessage")
            .match_body(Matcher::PartialJson(json!({ "text": "**hi**" })))
            .with_header("content-type", "application/json")
            .with_body(sent_message(8, "**hi**"))
            .create_async()
            .await;

        delivery(&server).post_follow_up("**hi**").await.unwrap();

        html.assert_async().await;
        plain.assert_async().await;
    }

    #[tokio::test]
    async fn update_edits_the_placeholder_message() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/bottest-token/EditMessageText")
            .match_body(Matcher::PartialJson(json!({
                "chat_id": 42,
                "message_id": 7,
                "text": "done"
            })))
            .with_header("content-type", "application/json")
            .with_body(sent_message(7, "done"))
            .create_async()
            .await;

        delivery(&server)
            .update_placeholder(&DeliveryHandle::new("7"), "done")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn bad_handle_is_invalid_input() {
        let server = Server::new_async().await;
        let err = delivery(&server)
            .delete_placeholder(&DeliveryHandle::new("not-a-number"))
            .await
            .unwrap_err();
        assert!(matches!(err, relay_channels::Error::InvalidInput { .. }));
    }

    #[test]
    fn chunk_size_is_clamped_to_telegram_limit() {
        let bot = Bot::new("test-token");
        let capped = TelegramDelivery::new(bot.clone(), ChatId(1), 10_000);
        assert_eq!(capped.max_message_len(), 4096);
        let custom = TelegramDelivery::new(bot, ChatId(1), 3900);
        assert_eq!(custom.max_message_len(), 3900);
    }

    #[test]
    fn oversized_html_is_skipped() {
        let text = "<".repeat(2000);
        assert!(html_within_limit(&text).is_none());
        assert!(html_within_limit("short").is_some());
    }

    #[test]
    fn retry_after_duration_extracts_wait() {
        let err = RequestError::RetryAfter(teloxide::types::Seconds::from_seconds(42));
        assert_eq!(retry_after_duration(&err), Some(Duration::from_secs(42)));
    }

    #[test]
    fn retry_after_duration_ignores_other_errors() {
        let err = RequestError::Io(std::io::Error::other("boom"));
        assert_eq!(retry_after_duration(&err), None);
    }

    #[test]
    fn is_message_not_modified_error_detects_variant() {
        let err = RequestError::Api(ApiError::MessageNotModified);
        assert!(is_message_not_modified_error(&err));
        assert!(!is_message_not_modified_error(&RequestError::Io(
            std::io::Error::other("boom")
        )));
    }
}
