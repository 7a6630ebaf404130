//! HTTP client for a hosted agent engine.
//!
//! Session management goes through `POST {endpoint}:query` with a
//! `class_method` envelope; turns stream from `:streamQuery?alt=sse` as
//! newline-delimited JSON events. Session events and memory generation use the
//! engine's REST sub-resources.

use std::time::Duration;

use {
    async_trait::async_trait,
    futures::StreamExt,
    relay_common::NormalizedPart,
    secrecy::{ExposeSecret, Secret},
    serde_json::{Map, Value, json},
    time::{OffsetDateTime, format_description::well_known::Rfc3339},
    tracing::{debug, info},
};

use crate::{
    AgentEvent, Error, EventStream, MemoryStore, Message, RemoteAgent, RemoteSession, Result,
    SessionStore,
};

pub struct AgentEngineClient {
    client: reqwest::Client,
    endpoint: String,
    access_token: Secret<String>,
}

impl AgentEngineClient {
    pub fn new(
        endpoint: impl Into<String>,
        access_token: Secret<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint, access_token))
    }

    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        access_token: Secret<String>,
    ) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            client,
            endpoint,
            access_token,
        }
    }

    /// Resource path of the engine (`projects/…/reasoningEngines/…`).
    fn resource_name(&self) -> &str {
        ["/v1/", "/v1beta1/"]
            .iter()
            .find_map(|marker| self.endpoint.split_once(marker).map(|(_, tail)| tail))
            .unwrap_or(&self.endpoint)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response> {
        let resp = self
            .client
            .post(url)
            .bearer_auth(self.access_token.expose_secret())
            .json(body)
            .send()
            .await?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        Err(remote_error(status, &text))
    }

    async fn query(&self, class_method: &str, input: Value) -> Result<Value> {
        let url = format!("{}:query", self.endpoint);
        let body = json!({ "class_method": class_method, "input": input });
        let value: Value = self.post(&url, &body).await?.json().await?;
        debug!(class_method, "agent engine query ok");
        Ok(value)
    }

    async fn append_event(&self, session_id: &str, mut event: Map<String, Value>) -> Result<()> {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| Error::message(format!("format event timestamp: {e}")))?;
        event.insert(
            "invocationId".into(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
        event.insert("timestamp".into(), Value::String(timestamp));
        let url = format!("{}/sessions/{session_id}:appendEvent", self.endpoint);
        self.post(&url, &Value::Object(event)).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteAgent for AgentEngineClient {
    async fn stream_turn(
        &self,
        external_user_id: &str,
        session_id: &str,
        message: &Message,
    ) -> Result<EventStream> {
        let url = format!("{}:streamQuery?alt=sse", self.endpoint);
        let body = json!({
            "class_method": "async_stream_query",
            "input": {
                "user_id": external_user_id,
                "session_id": session_id,
                "message": serde_json::to_value(message)?,
            },
        });
        let resp = self.post(&url, &body).await?;
        info!(session_id, parts = message.parts.len(), "agent stream opened");

        let mut byte_stream = resp.bytes_stream();
        let stream = async_stream::stream! {
            let mut buf: Vec<u8> = Vec::new();
            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(Error::from(e));
                        return;
                    }
                };
                buf.extend_from_slice(&chunk);

                while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    let Some(item) = decode_stream_line(&String::from_utf8_lossy(&line)) else {
                        continue;
                    };
                    let fatal = matches!(&item, Err(e) if !e.is_event_local());
                    yield item;
                    if fatal {
                        return;
                    }
                }
            }
            if let Some(item) = decode_stream_line(&String::from_utf8_lossy(&buf)) {
                yield item;
            }
        };
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl SessionStore for AgentEngineClient {
    async fn list_sessions(&self, external_user_id: &str) -> Result<Vec<RemoteSession>> {
        let out = self
            .query("list_sessions", json!({ "user_id": external_user_id }))
            .await?;
        match out["output"].get("sessions") {
            Some(sessions) => Ok(serde_json::from_value(sessions.clone())?),
            None => Ok(Vec::new()),
        }
    }

    async fn create_session(&self, external_user_id: &str) -> Result<String> {
        let out = self
            .query("create_session", json!({ "user_id": external_user_id }))
            .await?;
        out["output"]["id"]
            .as_str()
            .or_else(|| out["sessionId"].as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::message("create_session response carried no session id"))
    }

    async fn get_session(
        &self,
        external_user_id: &str,
        session_id: &str,
    ) -> Result<Option<RemoteSession>> {
        let input = json!({ "user_id": external_user_id, "session_id": session_id });
        let out = match self.query("get_session", input).await {
            Ok(out) => out,
            Err(Error::Remote { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        match &out["output"] {
            Value::Null => Ok(None),
            session => Ok(Some(serde_json::from_value(session.clone())?)),
        }
    }

    async fn delete_session(&self, external_user_id: &str, session_id: &str) -> Result<()> {
        let input = json!({ "user_id": external_user_id, "session_id": session_id });
        self.query("delete_session", input).await?;
        Ok(())
    }

    async fn append_state_delta(
        &self,
        session_id: &str,
        external_user_id: &str,
        delta: Map<String, Value>,
    ) -> Result<()> {
        debug!(session_id, external_user_id, keys = delta.len(), "appending state delta");
        let mut event = Map::new();
        event.insert("author".into(), Value::String("user".into()));
        event.insert("actions".into(), json!({ "stateDelta": delta }));
        self.append_event(session_id, event).await
    }

    async fn append_message(
        &self,
        session_id: &str,
        external_user_id: &str,
        author: &str,
        parts: Vec<NormalizedPart>,
    ) -> Result<()> {
        debug!(session_id, external_user_id, author, parts = parts.len(), "appending message");
        let mut event = Map::new();
        event.insert("author".into(), Value::String(author.to_string()));
        event.insert(
            "content".into(),
            json!({ "role": "user", "parts": serde_json::to_value(parts)? }),
        );
        self.append_event(session_id, event).await
    }
}

#[async_trait]
impl MemoryStore for AgentEngineClient {
    async fn commit_session_to_memory(&self, session: &RemoteSession) -> Result<()> {
        let url = format!("{}/memories:generate", self.endpoint);
        let source = format!("{}/sessions/{}", self.resource_name(), session.id);
        let body = json!({ "vertexSessionSource": { "session": source } });
        self.post(&url, &body).await?;
        info!(session_id = %session.id, "session committed to memory");
        Ok(())
    }
}

/// Decode one line of the turn stream. `None` for blank lines, SSE framing and
/// the terminal `[DONE]` marker.
fn decode_stream_line(line: &str) -> Option<Result<AgentEvent>> {
    let line = line.trim();
    if line.starts_with(':') || ["event:", "id:", "retry:"].iter().any(|p| line.starts_with(p)) {
        return None;
    }
    let data = line.strip_prefix("data:").map_or(line, str::trim_start);
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return Some(Err(Error::decode(e))),
    };
    if let Some(err) = value.get("error") {
        let status = err
            .get("code")
            .or_else(|| value.get("code"))
            .and_then(Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(0);
        let message = error_message(err).unwrap_or_else(|| err.to_string());
        return Some(Err(Error::remote(status, message)));
    }
    Some(serde_json::from_value(value).map_err(Error::decode))
}

fn remote_error(status: u16, body: &str) -> Error {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(error_message))
        .unwrap_or_else(|| body.trim().to_string());
    Error::remote(status, message)
}

/// Flatten a Google-style error object to `"STATUS: message"`.
fn error_message(err: &Value) -> Option<String> {
    match err {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => {
            let message = obj.get("message").and_then(Value::as_str).unwrap_or_default();
            Some(match obj.get("status").and_then(Value::as_str) {
                Some(status) => format!("{status}: {message}"),
                None => message.to_string(),
            })
        },
        _ => None,
    }
}
