//! The Slack Web API calls the front-end makes, behind a trait so handlers
//! and delivery can run against a fake.

use std::sync::Arc;

use {async_trait::async_trait, slack_morphism::prelude::*};

use crate::Result;

/// The parts of a user's profile a turn is enriched with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlackProfile {
    pub display_name: Option<String>,
    pub real_name: Option<String>,
    pub email: Option<String>,
}

impl SlackProfile {
    /// Display name, falling back to the real name. Slack sends empty strings
    /// for unset fields.
    pub fn name(&self) -> Option<&str> {
        [&self.display_name, &self.real_name]
            .into_iter()
            .filter_map(|name| name.as_deref().map(str::trim))
            .find(|name| !name.is_empty())
    }
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Post `text` to `channel`, inside `thread_ts` when given. Returns the
    /// new message's timestamp.
    async fn post_message(&self, channel: &str, thread_ts: Option<&str>, text: &str)
    -> Result<String>;

    async fn update_message(&self, channel: &str, ts: &str, text: &str) -> Result<()>;

    async fn delete_message(&self, channel: &str, ts: &str) -> Result<()>;

    async fn user_profile(&self, user_id: &str) -> Result<SlackProfile>;
}

/// [`SlackApi`] over slack-morphism's hyper client, authenticated with the
/// bot token.
pub struct WebApi {
    client: Arc<SlackHyperClient>,
    token: SlackApiToken,
}

impl WebApi {
    pub fn new(client: Arc<SlackHyperClient>, token: SlackApiToken) -> Self {
        Self { client, token }
    }
}

#[async_trait]
impl SlackApi for WebApi {
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<String> {
        let mut request = SlackApiChatPostMessageRequest::new(
            SlackChannelId::new(channel.into()),
            SlackMessageContent::new().with_text(text.into()),
        );
        if let Some(ts) = thread_ts {
            request = request.with_thread_ts(SlackTs::new(ts.into()));
        }
        let session = self.client.open_session(&self.token);
        let response = session.chat_post_message(&request).await?;
        Ok(response.ts.to_string())
    }

    async fn update_message(&self, channel: &str, ts: &str, text: &str) -> Result<()> {
        let request = SlackApiChatUpdateRequest::new(
            SlackChannelId::new(channel.into()),
            SlackMessageContent::new().with_text(text.into()),
            SlackTs::new(ts.into()),
        );
        let session = self.client.open_session(&self.token);
        session.chat_update(&request).await?;
        Ok(())
    }

    async fn delete_message(&self, channel: &str, ts: &str) -> Result<()> {
        let request = SlackApiChatDeleteRequest::new(
            SlackChannelId::new(channel.into()),
            SlackTs::new(ts.into()),
        );
        let session = self.client.open_session(&self.token);
        session.chat_delete(&request).await?;
        Ok(())
    }

    async fn user_profile(&self, user_id: &str) -> Result<SlackProfile> {
        let request = SlackApiUsersInfoRequest::new(SlackUserId::new(user_id.into()));
        let session = self.client.open_session(&self.token);
        let response = session.users_info(&request).await?;
        let Some(profile) = response.user.profile else {
            return Ok(SlackProfile::default());
        };
        Ok(SlackProfile {
            display_name: profile.display_name,
            real_name: profile.real_name,
            email: profile.email.map(|email| email.to_string()),
        })
    }
}
