//! Error types for the sync engine.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Fallback shown when a transport failure carries no message of its own.
const GENERIC_TRANSPORT_MESSAGE: &str = "Request failed";

/// Errors that can occur while editing or synchronizing provider configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// Template key or entity id is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote authority answered with a non-ok status.
    #[error("{0}")]
    RemoteRejected(String),

    /// Network or decoding failure before a usable answer arrived.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Informational gap such as an empty model list or an empty manual model id.
    #[error("{0}")]
    ValidationGap(String),

    /// A local precondition is unmet (usually: nothing is selected).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// A field view refused a write.
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// The human-readable message for this error, if it has a non-empty one.
    ///
    /// Embedded remote messages win, then transport messages (with a generic
    /// fallback), then the display form of every other variant.
    pub fn user_message(&self) -> Option<String> {
        let message = match self {
            Self::RemoteRejected(message) => message.trim().to_string(),
            Self::Transport(message) if message.trim().is_empty() => {
                GENERIC_TRANSPORT_MESSAGE.to_string()
            }
            Self::Transport(message) => message.trim().to_string(),
            other => other.to_string(),
        };
        (!message.is_empty()).then_some(message)
    }
}

/// Normalize an error into a single user-facing message with an
/// operation-specific fallback.
pub fn describe(error: &Error, fallback: &str) -> String {
    error
        .user_message()
        .unwrap_or_else(|| fallback.to_string())
}
