//! Error types for the recollect core library.

use thiserror::Error;

/// Top-level error type for all recollect operations.
///
/// Most store operations are fail-soft and never surface these to the
/// caller; they appear only on the explicit `try_*` paths and during
/// configuration loading.
#[derive(Error, Debug)]
pub enum RecollectError {
    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A role string other than `user` or `assistant`.
    #[error("Invalid role: {0:?}")]
    InvalidRole(String),

    /// A background task panicked or was cancelled before finishing.
    #[error("Background task failed: {0}")]
    BackgroundTask(String),

    /// The embedding provider failed to produce a vector.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for RecollectError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, RecollectError>;
