//! Centralized error types for mailsense.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailsense library.
#[derive(Error, Debug)]
pub enum MailsenseError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A persisted state file exists but contains malformed JSON.
    #[error("Corrupt state file '{path}': {reason}")]
    CorruptState { path: PathBuf, reason: String },

    /// Writing a state file failed. Never downgraded: a fetch that cannot
    /// persist its result must not report success.
    #[error("Failed to persist '{path}': {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The mail provider rejected or failed a request.
    #[error("Mail provider error: {0}")]
    Provider(String),

    /// OAuth token is missing, unreadable, or could not be refreshed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The text-generation service failed or returned an unusable response.
    #[error("Text generation error: {0}")]
    TextGen(String),

    /// An export operation failed.
    #[error("Export error: {0}")]
    Export(String),

    /// Underlying HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Convenience alias for `Result<T, MailsenseError>`.
pub type Result<T> = std::result::Result<T, MailsenseError>;

impl MailsenseError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Persist` variant from a path and an `io::Error`.
    pub fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persist {
            path: path.into(),
            source,
        }
    }

    /// Create a `CorruptState` variant from a path and a reason.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptState {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
