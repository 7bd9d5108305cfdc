use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Xmpp(#[from] wxrelay_xmpp::Error),

    #[error(transparent)]
    Routing(#[from] wxrelay_routing::Error),

    #[error(transparent)]
    ChatLog(#[from] wxrelay_chatlog::Error),

    #[error(transparent)]
    Platform(#[from] wxrelay_platforms::Error),

    /// The session loop has stopped and can no longer answer.
    #[error("relay session is not running")]
    SessionClosed,

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
}

impl wxrelay_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

wxrelay_common::impl_context!();
