use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The engine answered with an error status or an in-stream error object.
    #[error("agent engine error {status}: {message}")]
    Remote { status: u16, message: String },

    /// A single stream line could not be decoded into an event.
    #[error("undecodable agent event: {detail}")]
    Decode { detail: String },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn decode(detail: impl std::fmt::Display) -> Self {
        Self::Decode {
            detail: detail.to_string(),
        }
    }

    /// The engine no longer knows the session we referenced.
    ///
    /// Requires a not-found indication (HTTP 404 or `NOT_FOUND` / "not found"
    /// in the message) together with a session-identifier marker.
    pub fn is_stale_session(&self) -> bool {
        match self {
            Self::Remote { status, message } => is_stale_session_message(Some(*status), message),
            Self::Message { message } => is_stale_session_message(None, message),
            _ => false,
        }
    }

    /// Faults scoped to one event; the stream itself is still healthy.
    pub fn is_event_local(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

fn is_stale_session_message(status: Option<u16>, message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    let not_found =
        status == Some(404) || lower.contains("not_found") || lower.contains("not found");
    let marker = ["sessionid", "session_id", "session id"]
        .iter()
        .any(|m| lower.contains(m));
    not_found && marker
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(Error::remote(404, "NOT_FOUND: sessionId 123 does not exist"), true)]
    #[case(Error::remote(400, "404 NOT_FOUND: Session with sessionId=9 not found"), true)]
    #[case(Error::remote(404, "reasoning engine not found"), false)]
    #[case(Error::remote(500, "internal error for session_id 4"), false)]
    #[case(Error::message("Session not found: session id abc"), true)]
    #[case(Error::decode("expected value"), false)]
    fn detects_stale_sessions(#[case] err: Error, #[case] stale: bool) {
        assert_eq!(err.is_stale_session(), stale);
    }

    #[test]
    fn decode_errors_are_event_local() {
        assert!(Error::decode("bad").is_event_local());
        assert!(!Error::remote(500, "boom").is_event_local());
    }
}
