use std::error::Error as StdError;

/// Crate-wide result type for platform operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed platform errors that are not delivery outcomes.
///
/// A failed post is a [`crate::DeliveryFailure`], not an `Error`; this type
/// covers setup, storage and media plumbing around the post.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input payload or parameter is invalid.
    #[error("invalid platform input: {message}")]
    InvalidInput { message: String },

    /// A requested account ID is not registered.
    #[error("unknown {kind} account: {account_id}")]
    UnknownAccount { kind: String, account_id: String },

    /// Media could not be fetched or was unusable.
    #[error("media {url}: {message}")]
    Media { url: String, message: String },

    /// Wrapped source error from an external dependency.
    #[error("platform operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unknown_account(kind: impl std::fmt::Display, account_id: impl std::fmt::Display) -> Self {
        Self::UnknownAccount {
            kind: kind.to_string(),
            account_id: account_id.to_string(),
        }
    }

    #[must_use]
    pub fn media(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Media {
            url: url.into(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
