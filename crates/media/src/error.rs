#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid attachment policy: {message}")]
    InvalidPolicy { message: String },
}

impl Error {
    #[must_use]
    pub fn invalid_policy(message: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
