//! Events streamed back by the agent engine and the session records it keeps.

use {
    serde::Deserialize,
    serde_json::{Map, Value},
};

/// One typed part of an agent event.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// Text meant for the user.
    FinalText(String),
    /// Intermediate reasoning, shown live but never part of the answer.
    ThoughtText(String),
    ToolCall { name: String, args: Value },
    ToolResponse { name: String, response: Value },
}

/// A single streamed event: who produced it and its ordered parts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawEvent")]
pub struct AgentEvent {
    pub author: String,
    pub parts: Vec<Part>,
}

impl AgentEvent {
    pub fn new(author: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            author: author.into(),
            parts,
        }
    }
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    content: Option<RawContent>,
}

#[derive(Deserialize)]
struct RawContent {
    #[serde(default)]
    parts: Vec<RawPart>,
}

#[derive(Deserialize)]
struct RawPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
    #[serde(default, alias = "functionCall")]
    function_call: Option<RawFunctionCall>,
    #[serde(default, alias = "functionResponse")]
    function_response: Option<RawFunctionResponse>,
}

#[derive(Deserialize)]
struct RawFunctionCall {
    #[serde(default)]
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Deserialize)]
struct RawFunctionResponse {
    #[serde(default)]
    name: String,
    #[serde(default)]
    response: Value,
}

impl RawPart {
    fn into_part(self) -> Option<Part> {
        let thought = self.thought.unwrap_or(false);
        match self.text {
            Some(text) if !text.is_empty() && !thought => return Some(Part::FinalText(text)),
            Some(text) if !text.is_empty() => return Some(Part::ThoughtText(text)),
            _ => {},
        }
        if let Some(call) = self.function_call {
            return Some(Part::ToolCall {
                name: call.name,
                args: call.args,
            });
        }
        self.function_response.map(|resp| Part::ToolResponse {
            name: resp.name,
            response: resp.response,
        })
    }
}

impl From<RawEvent> for AgentEvent {
    fn from(raw: RawEvent) -> Self {
        let parts = raw
            .content
            .map(|c| c.parts.into_iter().filter_map(RawPart::into_part).collect())
            .unwrap_or_default();
        Self {
            author: raw.author.unwrap_or_default(),
            parts,
        }
    }
}

/// A session as the engine reports it from list/get.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteSession {
    pub id: String,
    #[serde(default, alias = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub state: Map<String, Value>,
    #[serde(default, alias = "lastUpdateTime")]
    pub last_update_time: Option<f64>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn parses_every_part_kind_in_order() {
        let event: AgentEvent = serde_json::from_value(json!({
            "author": "root_agent",
            "content": { "parts": [
                { "text": "thinking hard", "thought": true },
                { "function_call": { "name": "search", "args": { "q": "rust" } } },
                { "functionResponse": { "name": "search", "response": { "hits": 3 } } },
                { "text": "Done." }
            ]}
        }))
        .unwrap();

        assert_eq!(event.author, "root_agent");
        assert_eq!(event.parts, vec![
            Part::ThoughtText("thinking hard".into()),
            Part::ToolCall {
                name: "search".into(),
                args: json!({ "q": "rust" })
            },
            Part::ToolResponse {
                name: "search".into(),
                response: json!({ "hits": 3 })
            },
            Part::FinalText("Done.".into()),
        ]);
    }

    #[test]
    fn empty_text_parts_are_dropped() {
        let event: AgentEvent = serde_json::from_value(json!({
            "author": "a",
            "content": { "parts": [ { "text": "" }, { "thought": true } ] }
        }))
        .unwrap();
        assert!(event.parts.is_empty());
    }

    #[test]
    fn event_without_content_has_no_parts() {
        let event: AgentEvent = serde_json::from_value(json!({ "author": "a" })).unwrap();
        assert!(event.parts.is_empty());
    }

    #[test]
    fn remote_session_accepts_camel_case() {
        let session: RemoteSession = serde_json::from_value(json!({
            "id": "77",
            "userId": "Telegram: 1",
            "state": { "user_id": "Telegram: 1" },
            "lastUpdateTime": 1718000000.5
        }))
        .unwrap();
        assert_eq!(session.user_id, "Telegram: 1");
        assert_eq!(session.state["user_id"], "Telegram: 1");
        assert_eq!(session.last_update_time, Some(1718000000.5));
    }
}
