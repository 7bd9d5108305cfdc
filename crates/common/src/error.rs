use thiserror::Error;

use crate::FromMessage;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid channel {name:?}: {reason}")]
    InvalidChannel { name: String, reason: &'static str },

    #[error("{0}")]
    Message(String),
}

impl Error {
    #[must_use]
    pub fn invalid_channel(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidChannel {
            name: name.into(),
            reason,
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
