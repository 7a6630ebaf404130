//! Outgoing user messages.

use {relay_common::NormalizedPart, serde::Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

/// The payload sent to the engine for one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<NormalizedPart>,
}

impl Message {
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Combine text and normalized attachments into a user message.
///
/// The text part, when `text` is non-empty, always comes first. Both inputs
/// empty yields a message without parts; callers must not send it.
pub fn build(text: &str, attachments: Vec<NormalizedPart>) -> Message {
    let mut parts = Vec::with_capacity(attachments.len() + 1);
    if !text.is_empty() {
        parts.push(NormalizedPart::text(text));
    }
    parts.extend(attachments);
    Message {
        role: Role::User,
        parts,
    }
}

/// The chat participant who triggered a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnUser {
    /// Platform user id.
    pub id: String,
    pub display_name: String,
    /// Contact address, when the platform shares one.
    pub email: Option<String>,
    /// Identity the session is switched to for personal memory access.
    pub personal_identity: String,
}

/// Prefix the message with who sent it and list attachment names, so the
/// agent sees the speaker in shared chats.
pub fn enrich_text(user: Option<&TurnUser>, text: &str, attachment_names: &[&str]) -> String {
    let mut enriched = match user {
        Some(TurnUser {
            id,
            display_name,
            email: Some(email),
            ..
        }) => format!("Message from {display_name} {email} ({id}): {text}"),
        Some(user) => format!("Message from {} ({}): {text}", user.display_name, user.id),
        None => text.to_string(),
    };
    if !attachment_names.is_empty() {
        enriched.push_str(&format!(
            " Attached files: {}.",
            attachment_names.join(", ")
        ));
    }
    enriched
}
