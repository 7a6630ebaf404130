use std::sync::Arc;

use {
    teloxide::{
        prelude::*,
        types::{MediaKind, MessageKind, User},
    },
    tracing::{debug, info, warn},
};

use {
    relay_agents::TurnUser,
    relay_channels::{ChatKind, DeliveryAdapter, InboundRoute, mentions_bot, route_inbound},
    relay_chat::{DeleteOutcome, DeliveryOutcome, SaveOutcome, TurnRequest},
    relay_common::AttachedFile,
    relay_sessions::ConversationIdentity,
};

use crate::{Error, Result, error::Context, outbound::TelegramDelivery, state::BotContext};

/// Platform prefix of every Telegram conversation identity.
pub const PLATFORM: &str = "Telegram";

/// Slash commands the bot answers itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    DeleteSession,
    SaveSession,
}

impl Command {
    pub const ALL: [Self; 2] = [Self::DeleteSession, Self::SaveSession];

    pub fn name(self) -> &'static str {
        match self {
            Self::DeleteSession => "delete_session",
            Self::SaveSession => "save_session",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::DeleteSession => "Delete this chat's agent session",
            Self::SaveSession => "Save this chat's session to long-term memory",
        }
    }
}

/// A file referenced by a message, not yet downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingFile {
    file_id: String,
    name: String,
    type_hint: Option<String>,
    size: u64,
}

/// Handle one inbound message from the polling loop.
pub async fn handle_message(msg: Message, ctx: Arc<BotContext>) -> Result<()> {
    let from_bot = msg.from.as_ref().is_some_and(|u| u.is_bot);
    let text = extract_text(&msg).unwrap_or_default();

    if !from_bot && let Some(command) = parse_command(&text, ctx.bot_username()) {
        return handle_command(command, &msg, &ctx).await;
    }

    let kind = chat_kind(&msg);
    let pending = pending_files(&msg);
    let addressed = mentions_bot(&text, ctx.bot_username());
    let has_content = !text.trim().is_empty() || !pending.is_empty();
    let route = route_inbound(kind, addressed, from_bot, has_content);

    let conversation = ConversationIdentity::new(PLATFORM, msg.chat.id.0);
    debug!(conversation = %conversation, ?kind, addressed, ?route, "routing telegram message");
    if route == InboundRoute::Ignore {
        return Ok(());
    }

    let attachments = download_attachments(&ctx, pending).await;
    let user = msg.from.as_ref().map(turn_user);

    match route {
        InboundRoute::Reply => {
            let delivery = TelegramDelivery::new(
                ctx.bot.clone(),
                msg.chat.id,
                ctx.config.effective_chunk_size(),
            )
            .replying_to(msg.id);
            let turn = TurnRequest {
                conversation: conversation.clone(),
                user,
                text,
                attachments,
                show_tools: ctx.orchestrator.settings().show_tools,
            };
            let outcome = ctx.orchestrator.handle_turn(turn, &delivery).await;
            match outcome {
                DeliveryOutcome::Delivered { chunks } => {
                    info!(conversation = %conversation, chunks, "telegram turn delivered");
                },
                other => {
                    info!(conversation = %conversation, outcome = ?other, "telegram turn finished");
                },
            }
        },
        InboundRoute::RecordContext => {
            ctx.orchestrator
                .record_context(&conversation, user.as_ref(), &text, attachments)
                .await?;
            info!(conversation = %conversation, "recorded telegram message as context");
        },
        InboundRoute::Ignore => {},
    }
    Ok(())
}

async fn handle_command(command: Command, msg: &Message, ctx: &BotContext) -> Result<()> {
    let conversation = ConversationIdentity::new(PLATFORM, msg.chat.id.0);
    info!(conversation = %conversation, command = command.name(), "telegram command");

    let reply = match command {
        Command::DeleteSession => {
            let result = ctx.orchestrator.delete_session(&conversation).await;
            if let Err(e) = &result {
                warn!(conversation = %conversation, error = %e, "session delete failed");
            }
            delete_reply(&result)
        },
        Command::SaveSession => {
            let result = ctx.orchestrator.save_session_to_memory(&conversation).await;
            if let Err(e) = &result {
                warn!(conversation = %conversation, error = %e, "session save failed");
            }
            save_reply(&result)
        },
    };

    let delivery = TelegramDelivery::new(
        ctx.bot.clone(),
        msg.chat.id,
        ctx.config.effective_chunk_size(),
    )
    .replying_to(msg.id);
    delivery
        .post_follow_up(&reply)
        .await
        .map_err(|e| Error::external("command reply", e))
}

fn delete_reply(result: &relay_chat::Result<DeleteOutcome>) -> String {
    match result {
        Ok(DeleteOutcome::Deleted) => "🗑️ Deleted session for this chat.".into(),
        Ok(DeleteOutcome::NoActiveSession) => "No active session found for this chat.".into(),
        Err(e) => format!("❌ Error deleting session: {e}"),
    }
}

fn save_reply(result: &relay_chat::Result<SaveOutcome>) -> String {
    match result {
        Ok(SaveOutcome::Saved) => "💾 Saved session for this chat. It's now safe to delete the \
                                   session using `/delete_session` command"
            .into(),
        Ok(SaveOutcome::NoActiveSession) => "No active session found for this chat.".into(),
        Ok(SaveOutcome::SessionMissing) => "Could not find session to save.".into(),
        Err(e) => format!("❌ Error saving session: {e}"),
    }
}

/// Recognise `/command` and `/command@this_bot`. Commands addressed to a
/// different bot are not ours.
fn parse_command(text: &str, bot_username: &str) -> Option<Command> {
    let token = text.split_whitespace().next()?.strip_prefix('/')?;
    let (name, target) = match token.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (token, None),
    };
    if let Some(target) = target
        && !target.eq_ignore_ascii_case(bot_username)
    {
        return None;
    }
    Command::ALL.into_iter().find(|c| c.name() == name)
}

fn chat_kind(msg: &Message) -> ChatKind {
    if msg.chat.is_private() {
        ChatKind::Private
    } else if msg.chat.is_channel() {
        ChatKind::Channel
    } else if msg.chat.is_supergroup() {
        ChatKind::Supergroup
    } else {
        ChatKind::Group
    }
}

/// Message text, or the caption of a media message.
fn extract_text(msg: &Message) -> Option<String> {
    match &msg.kind {
        MessageKind::Common(common) => match &common.media_kind {
            MediaKind::Text(t) => Some(t.text.clone()),
            MediaKind::Photo(p) => p.caption.clone(),
            MediaKind::Document(d) => d.caption.clone(),
            MediaKind::Audio(a) => a.caption.clone(),
            MediaKind::Voice(v) => v.caption.clone(),
            MediaKind::Video(vid) => vid.caption.clone(),
            _ => None,
        },
        _ => None,
    }
}

/// Files worth forwarding to the agent. Photos resolve to their largest size.
fn pending_files(msg: &Message) -> Vec<PendingFile> {
    let MessageKind::Common(common) = &msg.kind else {
        return Vec::new();
    };
    let file = match &common.media_kind {
        MediaKind::Document(d) => PendingFile {
            file_id: d.document.file.id.clone(),
            name: d
                .document
                .file_name
                .clone()
                .unwrap_or_else(|| "document".into()),
            type_hint: Some(
                mime_string(d.document.mime_type.as_ref())
                    .unwrap_or_else(|| "application/octet-stream".into()),
            ),
            size: u64::from(d.document.file.size),
        },
        MediaKind::Photo(p) => {
            let Some(largest) = p.photo.last() else {
                return Vec::new();
            };
            PendingFile {
                file_id: largest.file.id.clone(),
                name: format!("photo_{}.jpg", largest.file.id),
                type_hint: Some("image/jpeg".into()),
                size: u64::from(largest.file.size),
            }
        },
        MediaKind::Audio(a) => PendingFile {
            file_id: a.audio.file.id.clone(),
            name: a
                .audio
                .file_name
                .clone()
                .unwrap_or_else(|| format!("audio_{}", a.audio.file.id)),
            type_hint: mime_string(a.audio.mime_type.as_ref()),
            size: u64::from(a.audio.file.size),
        },
        MediaKind::Voice(v) => PendingFile {
            file_id: v.voice.file.id.clone(),
            name: format!("voice_{}.ogg", v.voice.file.id),
            type_hint: Some(
                mime_string(v.voice.mime_type.as_ref()).unwrap_or_else(|| "audio/ogg".into()),
            ),
            size: u64::from(v.voice.file.size),
        },
        MediaKind::Video(vid) => PendingFile {
            file_id: vid.video.file.id.clone(),
            name: vid
                .video
                .file_name
                .clone()
                .unwrap_or_else(|| format!("video_{}.mp4", vid.video.file.id)),
            type_hint: Some(
                mime_string(vid.video.mime_type.as_ref()).unwrap_or_else(|| "video/mp4".into()),
            ),
            size: u64::from(vid.video.file.size),
        },
        _ => return Vec::new(),
    };
    vec![file]
}

fn mime_string(mime: Option<&impl ToString>) -> Option<String> {
    mime.map(ToString::to_string)
}

/// Download what fits the size limit. Oversized files are passed on without
/// content so the normalizer reports them with everything else it rejects;
/// download failures are logged and the file is left out.
async fn download_attachments(ctx: &BotContext, pending: Vec<PendingFile>) -> Vec<AttachedFile> {
    let mut files = Vec::with_capacity(pending.len());
    for file in pending {
        if file.size > ctx.config.max_attachment_bytes {
            debug!(
                name = %file.name,
                size = file.size,
                max_bytes = ctx.config.max_attachment_bytes,
                "not downloading oversized telegram attachment"
            );
            files.push(file.without_content());
            continue;
        }
        match download_telegram_file(&ctx.bot, &file.file_id).await {
            Ok(content) => {
                let mut attached = AttachedFile::new(file.name, file.type_hint, content);
                attached.declared_size = Some(file.size.max(attached.content.len() as u64));
                files.push(attached);
            },
            Err(e) => warn!(
                name = %file.name,
                file_id = %file.file_id,
                error = %e,
                "failed to download telegram attachment"
            ),
        }
    }
    files
}

impl PendingFile {
    /// Metadata-only attachment carrying the size Telegram reported.
    fn without_content(self) -> AttachedFile {
        let mut attached = AttachedFile::new(self.name, self.type_hint, Vec::new());
        attached.declared_size = Some(self.size);
        attached
    }
}

async fn download_telegram_file(bot: &Bot, file_id: &str) -> Result<Vec<u8>> {
    let file = bot.get_file(file_id).await?;

    // https://api.telegram.org/file/bot<token>/<file_path>
    let url = bot
        .api_url()
        .join(&format!("file/bot{}/{}", bot.token(), file.path))
        .context("invalid telegram file url")?;

    let response = reqwest::get(url).await?;
    if !response.status().is_success() {
        return Err(Error::Download {
            status: response.status().as_u16(),
        });
    }
    Ok(response.bytes().await?.to_vec())
}

fn turn_user(user: &User) -> TurnUser {
    let id = user.id.0.to_string();
    let full_name = match &user.last_name {
        Some(last) => format!("{} {last}", user.first_name),
        None => user.first_name.clone(),
    };
    let display_name = match full_name.trim() {
        "" => user.username.clone().unwrap_or_else(|| id.clone()),
        name => name.to_string(),
    };
    TurnUser {
        personal_identity: format!("{PLATFORM}: {id}"),
        id,
        display_name,
        email: None,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        rstest::rstest,
        serde_json::{Value, json},
    };

    fn message(chat: Value, extra: Value) -> Message {
        let mut raw = json!({
            "message_id": 5,
            "date": 1,
            "chat": chat,
            "from": {
                "id": 1001,
                "is_bot": false,
                "first_name": "Alice",
                "last_name": "Liddell",
                "username": "alice"
            }
        });
        for (k, v) in extra.as_object().unwrap() {
            raw[k.as_str()] = v.clone();
        }
        serde_json::from_value(raw).expect("deserialize message")
    }

    fn private_chat() -> Value {
        json!({ "id": 42, "type": "private", "first_name": "Alice" })
    }

    #[rstest]
    #[case("/delete_session", Some(Command::DeleteSession))]
    #[case("/save_session", Some(Command::SaveSession))]
    #[case("/save_session@relay_bot now", Some(Command::SaveSession))]
    #[case("/delete_session@Relay_Bot", Some(Command::DeleteSession))]
    #[case("/delete_session@other_bot", None)]
    #[case("/help", None)]
    #[case("delete_session", None)]
    #[case("", None)]
    fn parses_commands(#[case] text: &str, #[case] expected: Option<Command>) {
        assert_eq!(parse_command(text, "relay_bot"), expected);
    }

    #[rstest]
    #[case(json!({ "id": 42, "type": "private", "first_name": "A" }), ChatKind::Private)]
    #[case(json!({ "id": -1, "type": "group", "title": "g" }), ChatKind::Group)]
    #[case(json!({ "id": -100, "type": "supergroup", "title": "s" }), ChatKind::Supergroup)]
    #[case(json!({ "id": -200, "type": "channel", "title": "c" }), ChatKind::Channel)]
    fn maps_chat_kinds(#[case] chat: Value, #[case] expected: ChatKind) {
        let msg = message(chat, json!({ "text": "hi" }));
        assert_eq!(chat_kind(&msg), expected);
    }

    #[test]
    fn caption_counts_as_text() {
        let msg = message(
            private_chat(),
            json!({
                "caption": "look at this",
                "photo": [
                    { "file_id": "small", "file_unique_id": "s", "width": 90, "height": 90, "file_size": 100 },
                    { "file_id": "big", "file_unique_id": "b", "width": 800, "height": 800, "file_size": 9000 }
                ]
            }),
        );
        assert_eq!(extract_text(&msg).as_deref(), Some("look at this"));

        let files = pending_files(&msg);
        assert_eq!(files, vec![PendingFile {
            file_id: "big".into(),
            name: "photo_big.jpg".into(),
            type_hint: Some("image/jpeg".into()),
            size: 9000,
        }]);
    }

    #[test]
    fn oversized_file_reaches_the_normalizer_as_too_large() {
        let policy = relay_media::AttachmentPolicy::default();
        let pending = PendingFile {
            file_id: "movie".into(),
            name: "movie.mp4".into(),
            type_hint: Some("video/mp4".into()),
            size: policy.max_bytes + 1,
        };

        let attached = pending.without_content();
        assert!(attached.content.is_empty());
        assert_eq!(attached.effective_size(), policy.max_bytes + 1);

        let report = relay_media::normalize(vec![attached], &policy);
        assert!(report.parts.is_empty());
        assert_eq!(report.skipped[0].name, "movie.mp4");
        assert!(matches!(
            report.skipped[0].reason,
            relay_media::SkipReason::TooLarge { .. }
        ));
    }

    #[test]
    fn document_defaults_name_and_mime() {
        let msg = message(
            private_chat(),
            json!({
                "document": { "file_id": "doc-1", "file_unique_id": "d", "file_size": 12 }
            }),
        );
        let files = pending_files(&msg);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "document");
        assert_eq!(files[0].type_hint.as_deref(), Some("application/octet-stream"));
    }

    #[test]
    fn document_keeps_reported_name_and_mime() {
        let msg = message(
            private_chat(),
            json!({
                "document": {
                    "file_id": "doc-2",
                    "file_unique_id": "d2",
                    "file_name": "report.pdf",
                    "mime_type": "application/pdf",
                    "file_size": 2048
                }
            }),
        );
        let files = pending_files(&msg);
        assert_eq!(files[0].name, "report.pdf");
        assert_eq!(files[0].type_hint.as_deref(), Some("application/pdf"));
        assert_eq!(files[0].size, 2048);
    }

    #[test]
    fn plain_text_has_no_files() {
        let msg = message(private_chat(), json!({ "text": "hello" }));
        assert!(pending_files(&msg).is_empty());
        assert_eq!(extract_text(&msg).as_deref(), Some("hello"));
    }

    #[test]
    fn turn_user_uses_full_name() {
        let msg = message(private_chat(), json!({ "text": "hello" }));
        let user = turn_user(msg.from.as_ref().unwrap());
        assert_eq!(user, TurnUser {
            id: "1001".into(),
            display_name: "Alice Liddell".into(),
            email: None,
            personal_identity: "Telegram: 1001".into(),
        });
    }

    #[test]
    fn command_replies() {
        assert_eq!(
            delete_reply(&Ok(DeleteOutcome::NoActiveSession)),
            "No active session found for this chat."
        );
        assert_eq!(
            delete_reply(&Ok(DeleteOutcome::Deleted)),
            "🗑️ Deleted session for this chat."
        );
        assert!(save_reply(&Ok(SaveOutcome::Saved)).contains("`/delete_session`"));
        assert_eq!(
            save_reply(&Ok(SaveOutcome::SessionMissing)),
            "Could not find session to save."
        );
        let err = relay_chat::Error::message("no memory store is configured");
        assert_eq!(
            save_reply(&Err(err)),
            "❌ Error saving session: no memory store is configured"
        );
    }
}
