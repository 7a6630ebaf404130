use {relay_common::FromMessage, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Agent(#[from] relay_agents::Error),

    #[error(transparent)]
    Session(#[from] relay_sessions::Error),

    #[error(transparent)]
    Delivery(#[from] relay_channels::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl std::fmt::Display) -> Self {
        Self::Message {
            message: message.to_string(),
        }
    }

    /// The remote session behind the conversation no longer exists.
    pub fn is_stale_session(&self) -> bool {
        match self {
            Self::Agent(e) => e.is_stale_session(),
            Self::Session(e) => e.is_stale_session(),
            Self::Delivery(_) | Self::Message { .. } => false,
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

relay_common::impl_context!();
