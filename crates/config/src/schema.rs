//! Config schema: agent engine connection, reply behaviour, attachment policy
//! and the Telegram and Slack front-ends.

use std::{collections::HashMap, time::Duration};

use {
    relay_media::AttachmentPolicy,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub agent: AgentConfig,
    pub chat: ChatConfig,
    pub attachments: AttachmentsConfig,
    pub telegram: TelegramConfig,
    pub slack: SlackConfig,
}

/// Where the remote agent engine lives and how to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Full resource URL of the engine, e.g.
    /// `https://…/v1/projects/p/locations/l/reasoningEngines/123`.
    pub endpoint: Option<String>,
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub access_token: Option<Secret<String>>,
    pub request_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            access_token: None,
            request_timeout_secs: 300,
        }
    }
}

impl AgentConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub placeholder: String,
    /// Forward tool-call and tool-response traces live.
    pub show_tools: bool,
    /// Let the agent read the sender's personal memories during a turn.
    pub personal_memory: bool,
    /// Chunk size for front-ends without their own limit.
    pub chunk_size: usize,
    pub stream_buffer: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            placeholder: "🧠 Thinking...".into(),
            show_tools: false,
            personal_memory: true,
            chunk_size: 3900,
            stream_buffer: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentsConfig {
    pub max_bytes: u64,
    /// Hint → MIME overrides. Replaces the built-in table when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_map: Option<HashMap<String, String>>,
    /// MIME types the agent accepts. Replaces the built-in set when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported: Option<Vec<String>>,
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            max_bytes: relay_media::normalize::DEFAULT_MAX_BYTES,
            mime_map: None,
            supported: None,
        }
    }
}

impl AttachmentsConfig {
    pub fn policy(&self) -> relay_media::Result<AttachmentPolicy> {
        AttachmentPolicy::new(
            self.max_bytes,
            self.mime_map.clone(),
            self.supported.clone(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub token: Option<Secret<String>>,
    pub chunk_size: usize,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            chunk_size: 4096,
        }
    }
}

/// Slack app credentials. Socket Mode needs both tokens; replies are chunked
/// at `chat.chunk_size`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Bot user OAuth token (`xoxb-…`).
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub bot_token: Option<Secret<String>>,
    /// App-level token with `connections:write` (`xapp-…`).
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub app_token: Option<Secret<String>>,
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
