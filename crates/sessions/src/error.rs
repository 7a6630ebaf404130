use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The remote session store rejected or failed a call.
    #[error(transparent)]
    Store(#[from] relay_agents::Error),
}

impl Error {
    pub fn is_stale_session(&self) -> bool {
        match self {
            Self::Store(e) => e.is_stale_session(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
