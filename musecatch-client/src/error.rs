//! Error types for musecatch-client
//!
//! Transport-level failures are represented here so they can be handled
//! locally (fallback to polling, skipped tick); only business outcomes are
//! turned into user-visible notices.

use thiserror::Error;

/// Main error type for musecatch-client
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed before a response envelope was read
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-zero envelope code
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    /// Response body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Push channel failed or ended without a terminal event
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request refused before reaching the backend
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Playback engine errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// Shared library errors (configuration, parsing)
    #[error(transparent)]
    Common(#[from] musecatch_common::Error),
}

impl Error {
    /// Text suitable for a user-facing notice
    pub fn user_message(&self) -> String {
        match self {
            Error::Api { message, .. } if !message.is_empty() => message.clone(),
            Error::InvalidInput(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

/// Convenience Result type using musecatch-client Error
pub type Result<T> = std::result::Result<T, Error>;
