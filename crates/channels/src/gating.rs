use serde::{Deserialize, Serialize};

/// Kind of chat an inbound message arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

/// What to do with an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundRoute {
    /// Run a turn and reply.
    Reply,
    /// Append to the conversation's session without replying.
    RecordContext,
    /// Drop the message.
    Ignore,
}

/// Decide how to handle an inbound message.
///
/// Private chats always get a reply. In groups the bot answers only when
/// addressed; everything else is kept as context so later answers can refer
/// to it. Messages from other bots and messages with nothing in them are
/// dropped.
pub fn route_inbound(
    kind: ChatKind,
    addressed: bool,
    from_bot: bool,
    has_content: bool,
) -> InboundRoute {
    if from_bot || !has_content {
        return InboundRoute::Ignore;
    }
    match kind {
        ChatKind::Private => InboundRoute::Reply,
        ChatKind::Group | ChatKind::Supergroup if addressed => InboundRoute::Reply,
        ChatKind::Group | ChatKind::Supergroup | ChatKind::Channel => InboundRoute::RecordContext,
    }
}

/// Whether `text` mentions `@bot_username` (case-insensitive).
pub fn mentions_bot(text: &str, bot_username: &str) -> bool {
    if bot_username.is_empty() {
        return false;
    }
    let needle = format!("@{}", bot_username.to_lowercase());
    text.to_lowercase().contains(&needle)
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(ChatKind::Private, false, InboundRoute::Reply)]
    #[case(ChatKind::Group, true, InboundRoute::Reply)]
    #[case(ChatKind::Supergroup, true, InboundRoute::Reply)]
    #[case(ChatKind::Group, false, InboundRoute::RecordContext)]
    #[case(ChatKind::Supergroup, false, InboundRoute::RecordContext)]
    #[case(ChatKind::Channel, true, InboundRoute::RecordContext)]
    fn routes_by_chat_kind(
        #[case] kind: ChatKind,
        #[case] addressed: bool,
        #[case] expected: InboundRoute,
    ) {
        assert_eq!(route_inbound(kind, addressed, false, true), expected);
    }

    #[test]
    fn drops_bots_and_empty_messages() {
        assert_eq!(
            route_inbound(ChatKind::Private, false, true, true),
            InboundRoute::Ignore
        );
        assert_eq!(
            route_inbound(ChatKind::Private, false, false, false),
            InboundRoute::Ignore
        );
    }

    #[test]
    fn mention_matching_ignores_case() {
        assert!(mentions_bot("hey @Relay_Bot what's up", "relay_bot"));
        assert!(!mentions_bot("hey relay_bot", "relay_bot"));
        assert!(!mentions_bot("@anyone", ""));
    }
}
