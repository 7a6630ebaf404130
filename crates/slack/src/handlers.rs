use std::sync::Arc;

use tracing::{debug, info, warn};

use {
    relay_agents::TurnUser,
    relay_channels::{ChatKind, InboundRoute, route_inbound},
    relay_chat::{DeliveryOutcome, TurnRequest},
    relay_sessions::ConversationIdentity,
};

use crate::{Result, api::SlackApi, outbound::SlackDelivery, state::SlackContext};

/// Platform prefix of every Slack conversation identity.
pub const PLATFORM: &str = "Slack";

/// Display name used when the sender's profile cannot be read.
const UNKNOWN_USER: &str = "Unknown User";

/// A plain user message, lifted out of a Socket Mode event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel: String,
    /// `im`, `mpim`, `channel` or `group`, when Slack says.
    pub channel_type: Option<String>,
    pub user: Option<String>,
    pub text: String,
    pub ts: String,
    pub thread_ts: Option<String>,
    pub from_bot: bool,
}

/// Handle one inbound message from the Socket Mode listener.
pub async fn handle_message(msg: InboundMessage, ctx: Arc<SlackContext>) -> Result<()> {
    let kind = chat_kind(msg.channel_type.as_deref(), &msg.channel);
    let addressed = mentions_user(&msg.text, ctx.bot_user_id());
    let text = strip_mention(&msg.text, ctx.bot_user_id());
    let route = route_inbound(kind, addressed, msg.from_bot, !text.is_empty());

    let conversation = ConversationIdentity::new(PLATFORM, &msg.channel);
    debug!(conversation = %conversation, ?kind, addressed, ?route, "routing slack message");
    if route == InboundRoute::Ignore {
        return Ok(());
    }

    let user = match &msg.user {
        Some(id) => Some(turn_user(ctx.api.as_ref(), id).await),
        None => None,
    };

    match route {
        InboundRoute::Reply => {
            let mut delivery = SlackDelivery::new(
                Arc::clone(&ctx.api),
                msg.channel.clone(),
                ctx.config.effective_chunk_size(),
            );
            if let Some(thread_ts) = &msg.thread_ts {
                delivery = delivery.in_thread(thread_ts.clone());
            }
            let turn = TurnRequest {
                conversation: conversation.clone(),
                user,
                text,
                attachments: Vec::new(),
                show_tools: ctx.orchestrator.settings().show_tools,
            };
            match ctx.orchestrator.handle_turn(turn, &delivery).await {
                DeliveryOutcome::Delivered { chunks } => {
                    info!(conversation = %conversation, chunks, "slack turn delivered");
                },
                other => {
                    info!(conversation = %conversation, outcome = ?other, "slack turn finished");
                },
            }
        },
        InboundRoute::RecordContext => {
            ctx.orchestrator
                .record_context(&conversation, user.as_ref(), &text, Vec::new())
                .await?;
            info!(conversation = %conversation, "recorded slack message as context");
        },
        InboundRoute::Ignore => {},
    }
    Ok(())
}

/// Direct messages are private; everything else is a shared channel. Falls
/// back to the channel id prefix when the event carries no type.
fn chat_kind(channel_type: Option<&str>, channel: &str) -> ChatKind {
    match channel_type {
        Some("im") => ChatKind::Private,
        Some(_) => ChatKind::Group,
        None if channel.starts_with('D') => ChatKind::Private,
        None => ChatKind::Group,
    }
}

fn mentions_user(text: &str, user_id: &str) -> bool {
    !user_id.is_empty() && text.contains(&format!("<@{user_id}>"))
}

/// Remove `<@user_id>` mentions and the whitespace they leave behind.
fn strip_mention(text: &str, user_id: &str) -> String {
    let stripped = if user_id.is_empty() {
        text.to_string()
    } else {
        text.replace(&format!("<@{user_id}>"), "")
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

async fn turn_user(api: &dyn SlackApi, user_id: &str) -> TurnUser {
    let (display_name, email) = match api.user_profile(user_id).await {
        Ok(profile) => (
            profile.name().unwrap_or(UNKNOWN_USER).to_string(),
            profile.email.filter(|email| !email.is_empty()),
        ),
        Err(e) => {
            warn!(user_id, error = %e, "failed to look up slack user");
            (UNKNOWN_USER.to_string(), None)
        },
    };
    TurnUser {
        id: user_id.to_string(),
        display_name,
        email,
        personal_identity: format!("{PLATFORM}: {user_id}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            api::SlackProfile,
            config::SlackBotConfig,
            outbound::tests::{ApiCall, FakeApi},
        },
        async_trait::async_trait,
        relay_agents::{
            AgentEvent, EventStream, Message, Part, RemoteAgent, RemoteSession, SessionStore,
        },
        relay_chat::{ChatOrchestrator, ChatSettings},
        relay_common::NormalizedPart,
        relay_sessions::SessionCache,
        rstest::rstest,
        serde_json::{Map, Value},
        std::sync::Mutex,
    };

    #[derive(Default)]
    struct EchoAgent {
        received: Mutex<Vec<(String, Message)>>,
    }

    #[async_trait]
    impl RemoteAgent for EchoAgent {
        async fn stream_turn(
            &self,
            user_id: &str,
            _session_id: &str,
            message: &Message,
        ) -> relay_agents::Result<EventStream> {
            self.received
                .lock()
                .unwrap()
                .push((user_id.to_string(), message.clone()));
            let events = vec![Ok(AgentEvent::new("root", vec![Part::FinalText(
                "hello back".into(),
            )]))];
            Ok(Box::pin(futures::stream::iter(events)))
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        appended: Mutex<Vec<(String, Vec<NormalizedPart>)>>,
    }

    #[async_trait]
    impl SessionStore for RecordingStore {
        async fn list_sessions(&self, _: &str) -> relay_agents::Result<Vec<RemoteSession>> {
            Ok(Vec::new())
        }

        async fn create_session(&self, _: &str) -> relay_agents::Result<String> {
            Ok("s1".into())
        }

        async fn get_session(
            &self,
            _: &str,
            _: &str,
        ) -> relay_agents::Result<Option<RemoteSession>> {
            Ok(None)
        }

        async fn delete_session(&self, _: &str, _: &str) -> relay_agents::Result<()> {
            Ok(())
        }

        async fn append_state_delta(
            &self,
            _: &str,
            _: &str,
            _: Map<String, Value>,
        ) -> relay_agents::Result<()> {
            Ok(())
        }

        async fn append_message(
            &self,
            _session_id: &str,
            user_id: &str,
            _author: &str,
            parts: Vec<NormalizedPart>,
        ) -> relay_agents::Result<()> {
            self.appended
                .lock()
                .unwrap()
                .push((user_id.to_string(), parts));
            Ok(())
        }
    }

    struct Harness {
        ctx: Arc<SlackContext>,
        api: Arc<FakeApi>,
        agent: Arc<EchoAgent>,
        store: Arc<RecordingStore>,
    }

    fn harness(profile: Option<SlackProfile>) -> Harness {
        let api = Arc::new(FakeApi {
            profile,
            ..FakeApi::default()
        });
        let agent = Arc::new(EchoAgent::default());
        let store = Arc::new(RecordingStore::default());
        let settings = ChatSettings {
            personal_memory: false,
            ..ChatSettings::default()
        };
        let orchestrator = ChatOrchestrator::new(
            Arc::new(SessionCache::new(store.clone())),
            agent.clone(),
            store.clone(),
            settings,
        );
        let ctx = Arc::new(SlackContext {
            api: api.clone(),
            bot_user_id: Some("UBOT".into()),
            orchestrator: Arc::new(orchestrator),
            config: SlackBotConfig::new("xoxb", "xapp"),
        });
        Harness {
            ctx,
            api,
            agent,
            store,
        }
    }

    fn ada() -> SlackProfile {
        SlackProfile {
            display_name: Some("Ada".into()),
            real_name: Some("Ada Lovelace".into()),
            email: Some("ada@example.com".into()),
        }
    }

    fn inbound(channel: &str, channel_type: &str, text: &str) -> InboundMessage {
        InboundMessage {
            channel: channel.into(),
            channel_type: Some(channel_type.into()),
            user: Some("U1".into()),
            text: text.into(),
            ts: "42.0".into(),
            thread_ts: None,
            from_bot: false,
        }
    }

    fn sent_text(message: &Message) -> &NormalizedPart {
        &message.parts[0]
    }

    #[tokio::test]
    async fn direct_message_gets_a_reply() {
        let h = harness(Some(ada()));

        handle_message(inbound("D1", "im", "hi there"), h.ctx.clone())
            .await
            .unwrap();

        let received = h.agent.received.lock().unwrap().clone();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, "Slack: D1");
        assert_eq!(
            sent_text(&received[0].1),
            &NormalizedPart::text("Message from Ada ada@example.com (U1): hi there")
        );
        assert_eq!(h.api.calls(), vec![
            ApiCall::Post {
                channel: "D1".into(),
                thread_ts: None,
                text: "🧠 Thinking...".into(),
            },
            ApiCall::Update {
                ts: "100.1".into(),
                text: "hello back".into(),
            },
        ]);
    }

    #[tokio::test]
    async fn channel_mention_replies_in_the_thread_without_the_mention() {
        let h = harness(Some(ada()));
        let mut msg = inbound("C1", "channel", "<@UBOT> summarize please");
        msg.thread_ts = Some("50.0".into());

        handle_message(msg, h.ctx.clone()).await.unwrap();

        let received = h.agent.received.lock().unwrap().clone();
        assert_eq!(
            sent_text(&received[0].1),
            &NormalizedPart::text("Message from Ada ada@example.com (U1): summarize please")
        );
        assert_eq!(h.api.calls()[0], ApiCall::Post {
            channel: "C1".into(),
            thread_ts: Some("50.0".into()),
            text: "🧠 Thinking...".into(),
        });
        assert!(h.store.appended.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unaddressed_channel_message_is_recorded_as_context() {
        let h = harness(None);

        handle_message(inbound("C1", "channel", "lunch at noon"), h.ctx.clone())
            .await
            .unwrap();

        assert!(h.api.calls().is_empty());
        assert!(h.agent.received.lock().unwrap().is_empty());
        let appended = h.store.appended.lock().unwrap().clone();
        assert_eq!(appended, vec![("Slack: C1".to_string(), vec![
            NormalizedPart::text("Message from Unknown User (U1): lunch at noon")
        ])]);
    }

    #[tokio::test]
    async fn bot_messages_are_ignored() {
        let h = harness(Some(ada()));
        let mut msg = inbound("D1", "im", "beep");
        msg.from_bot = true;

        handle_message(msg, h.ctx.clone()).await.unwrap();

        assert!(h.api.calls().is_empty());
        assert!(h.agent.received.lock().unwrap().is_empty());
        assert!(h.store.appended.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bare_mention_is_ignored() {
        let h = harness(Some(ada()));

        handle_message(inbound("C1", "channel", " <@UBOT> "), h.ctx.clone())
            .await
            .unwrap();

        assert!(h.api.calls().is_empty());
        assert!(h.store.appended.lock().unwrap().is_empty());
    }

    #[rstest]
    #[case(Some("im"), "D1", ChatKind::Private)]
    #[case(Some("mpim"), "G1", ChatKind::Group)]
    #[case(Some("channel"), "C1", ChatKind::Group)]
    #[case(Some("group"), "G2", ChatKind::Group)]
    #[case(None, "D9", ChatKind::Private)]
    #[case(None, "C9", ChatKind::Group)]
    fn maps_channel_types(
        #[case] channel_type: Option<&str>,
        #[case] channel: &str,
        #[case] expected: ChatKind,
    ) {
        assert_eq!(chat_kind(channel_type, channel), expected);
    }

    #[rstest]
    #[case("<@UBOT> hello", "hello")]
    #[case("hey <@UBOT>, look", "hey , look")]
    #[case("<@UOTHER> hello", "<@UOTHER> hello")]
    #[case("  spaced   out ", "spaced out")]
    fn strips_only_the_bot_mention(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(strip_mention(text, "UBOT"), expected);
    }

    #[test]
    fn mention_needs_a_known_bot_id() {
        assert!(mentions_user("<@UBOT> hi", "UBOT"));
        assert!(!mentions_user("<@UBOT> hi", ""));
        assert!(!mentions_user("UBOT hi", "UBOT"));
    }

    #[tokio::test]
    async fn profile_lookup_failure_falls_back_to_unknown_user() {
        let api = FakeApi::default();
        let user = turn_user(&api, "U7").await;
        assert_eq!(user, TurnUser {
            id: "U7".into(),
            display_name: "Unknown User".into(),
            email: None,
            personal_identity: "Slack: U7".into(),
        });
    }
}
