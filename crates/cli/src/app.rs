use std::{path::Path, sync::Arc};

use {
    anyhow::{Context, Result},
    relay_agents::AgentEngineClient,
    relay_chat::{ChatOrchestrator, ChatSettings},
    relay_config::RelayConfig,
    relay_sessions::{ConversationIdentity, SessionCache},
    tracing::{info, warn},
};

/// Load configuration, reporting which file (if any) was used.
pub fn load_config(explicit: Option<&Path>) -> Result<RelayConfig> {
    let (config, path) = relay_config::discover_and_load(explicit)?;
    match path {
        Some(path) => info!(path = %path.display(), "loaded config"),
        None => warn!("no config file found, using defaults"),
    }
    Ok(config)
}

/// Wire the agent engine client into a ready orchestrator.
pub fn build_orchestrator(config: &RelayConfig) -> Result<ChatOrchestrator> {
    let endpoint = config
        .agent
        .endpoint
        .as_deref()
        .context("agent.endpoint is not configured")?;
    let token = config
        .agent
        .access_token
        .clone()
        .context("agent.access_token is not configured")?;

    let client = Arc::new(AgentEngineClient::new(
        endpoint,
        token,
        config.agent.request_timeout(),
    )?);
    let sessions = Arc::new(SessionCache::new(client.clone()));
    let settings = ChatSettings {
        placeholder: config.chat.placeholder.clone(),
        show_tools: config.chat.show_tools,
        personal_memory: config.chat.personal_memory,
        stream_buffer: config.chat.stream_buffer,
    };
    let policy = config
        .attachments
        .policy()
        .context("invalid [attachments] settings")?;

    Ok(
        ChatOrchestrator::new(sessions, client.clone(), client.clone(), settings)
            .with_memory(client)
            .with_attachment_policy(policy),
    )
}

/// Accept either a full identity (`"Telegram: 42"`) or a bare id, which is
/// scoped to the CLI.
pub fn parse_conversation(raw: &str) -> ConversationIdentity {
    if raw.contains(": ") {
        ConversationIdentity::from_raw(raw)
    } else {
        ConversationIdentity::new("CLI", raw)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_ids_are_cli_scoped() {
        assert_eq!(parse_conversation("notes").as_str(), "CLI: notes");
        assert_eq!(parse_conversation("Telegram: -100").as_str(), "Telegram: -100");
    }

    #[test]
    fn missing_endpoint_is_reported() {
        let err = build_orchestrator(&RelayConfig::default()).err().unwrap();
        assert!(err.to_string().contains("agent.endpoint"));
    }

    #[test]
    fn missing_token_is_reported() {
        let mut config = RelayConfig::default();
        config.agent.endpoint = Some("https://example.com/v1/projects/p/reasoningEngines/1".into());
        let err = build_orchestrator(&config).err().unwrap();
        assert!(err.to_string().contains("agent.access_token"));
    }

    #[test]
    fn complete_config_builds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(
            &path,
            r#"
            [agent]
            endpoint = "https://example.com/v1/projects/p/reasoningEngines/1"
            access_token = "token"

            [chat]
            show_tools = true
            "#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        let orchestrator = build_orchestrator(&config).unwrap();
        assert!(orchestrator.settings().show_tools);
    }
}
