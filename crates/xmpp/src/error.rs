use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid jid {jid:?}: {reason}")]
    InvalidJid { jid: String, reason: &'static str },

    #[error("presence for unknown room {room}")]
    UnknownRoom { room: String },

    #[error("malformed stanza: {message}")]
    Malformed { message: String },

    #[error("transport closed")]
    TransportClosed,

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
