//! Payload types that cross crate boundaries: raw uploads coming in from a
//! front-end and the canonical parts sent to the remote agent.

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    serde::{Deserialize, Serialize},
};

use crate::Error;

/// A file uploaded alongside a chat message, before any validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedFile {
    pub name: String,
    /// MIME type or bare extension as reported by the platform.
    pub type_hint: Option<String>,
    pub content: Vec<u8>,
    /// Size the platform claims; may disagree with `content.len()`.
    pub declared_size: Option<u64>,
}

impl AttachedFile {
    pub fn new(name: impl Into<String>, type_hint: Option<String>, content: Vec<u8>) -> Self {
        let declared_size = Some(content.len() as u64);
        Self {
            name: name.into(),
            type_hint,
            content,
            declared_size,
        }
    }

    /// The size used for policy checks: never smaller than the actual bytes.
    pub fn effective_size(&self) -> u64 {
        let actual = self.content.len() as u64;
        self.declared_size.map_or(actual, |declared| declared.max(actual))
    }
}

/// One canonical unit of a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WirePart", try_from = "WirePart")]
pub enum NormalizedPart {
    Text(String),
    InlineData { mime_type: String, bytes: Vec<u8> },
}

impl NormalizedPart {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn inline(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::InlineData {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn mime_type(&self) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::InlineData { mime_type, .. } => Some(mime_type),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WirePart {
    Text { text: String },
    Inline { inline_data: WireInlineData },
}

#[derive(Serialize, Deserialize)]
struct WireInlineData {
    mime_type: String,
    data: String,
}

impl From<NormalizedPart> for WirePart {
    fn from(part: NormalizedPart) -> Self {
        match part {
            NormalizedPart::Text(text) => Self::Text { text },
            NormalizedPart::InlineData { mime_type, bytes } => Self::Inline {
                inline_data: WireInlineData {
                    mime_type,
                    data: STANDARD.encode(bytes),
                },
            },
        }
    }
}

impl TryFrom<WirePart> for NormalizedPart {
    type Error = Error;

    fn try_from(wire: WirePart) -> Result<Self, Self::Error> {
        Ok(match wire {
            WirePart::Text { text } => Self::Text(text),
            WirePart::Inline { inline_data } => Self::InlineData {
                mime_type: inline_data.mime_type,
                bytes: STANDARD.decode(inline_data.data)?,
            },
        })
    }
}
