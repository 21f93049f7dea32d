//! Error types for tgsession-rs

use std::path::PathBuf;

/// Result type alias for tgsession-rs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating, converting or storing sessions
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error while reading or writing session files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed while exporting a session
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A session file does not exist
    #[error("session file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// The data is not a session the client library can load
    #[error("invalid session: {reason}")]
    InvalidSession { reason: String },

    /// API id or hash failed validation
    #[error("invalid API credentials: {reason}")]
    InvalidApiCredentials { reason: String },

    /// Phone number failed validation
    #[error("invalid phone number: {input}")]
    InvalidPhone { input: String },

    /// Bot token does not look like `<id>:<secret>`
    #[error("invalid bot token: {reason}")]
    InvalidBotToken { reason: String },

    /// The phone number has no Telegram account attached
    #[error("phone number is not registered on Telegram, sign up with an official client first")]
    SignUpRequired,

    /// The login prompt was cancelled or returned no input
    #[error("login aborted: {reason}")]
    LoginAborted { reason: String },

    /// Any failure reported by the Telegram client library
    #[error("telegram error: {message}")]
    Telegram { message: String },

    /// Reading from the terminal failed
    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    /// Unknown export format name
    #[error("unsupported export format: {name}")]
    UnsupportedFormat { name: String },
}

impl Error {
    /// Create an invalid session error
    pub fn invalid_session(reason: impl Into<String>) -> Self {
        Self::InvalidSession {
            reason: reason.into(),
        }
    }

    /// Create an invalid API credentials error
    pub fn invalid_api(reason: impl Into<String>) -> Self {
        Self::InvalidApiCredentials {
            reason: reason.into(),
        }
    }

    /// Create an invalid bot token error
    pub fn invalid_bot_token(reason: impl Into<String>) -> Self {
        Self::InvalidBotToken {
            reason: reason.into(),
        }
    }

    /// Whether the user interrupted a prompt (Ctrl-C)
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            Error::Prompt(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted
        )
    }

    /// Wrap a client library failure
    pub fn telegram(err: impl std::fmt::Display) -> Self {
        Self::Telegram {
            message: err.to_string(),
        }
    }
}
