//! Error types for the annotation pipeline harness

use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the annotation pipeline harness
#[derive(Debug, Error)]
pub enum Error {
    /// Stage or manifest configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A stage with the same name is already registered
    #[error("Duplicate stage: {name}")]
    DuplicateStage {
        /// Name that collided
        name: String,
    },

    /// Annotation kind is not usable (empty name)
    #[error("Invalid annotation kind: {0}")]
    InvalidKind(String),

    /// A stage did not answer within its timeout, including the one retry
    #[error("Stage '{stage}' timed out after {timeout_ms}ms")]
    StageTimeout {
        /// Stage that timed out
        stage: String,
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// A stage reported a processing error or returned a malformed response
    #[error("Stage '{stage}' failed: {message}")]
    StageFailure {
        /// Stage that failed
        stage: String,
        /// Remote error description
        message: String,
    },

    /// The run was cancelled while a stage was in flight
    #[error("Cancelled while waiting on stage '{stage}'")]
    Cancelled {
        /// Stage whose wait was aborted
        stage: String,
    },

    /// The engine has been released; no further operations are accepted
    #[error("Engine is closed")]
    EngineClosed,

    /// Transport-level error raised by a stage client
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an `InvalidConfiguration` error
    pub fn config(message: impl Into<String>) -> Self {
        Error::InvalidConfiguration(message.into())
    }

    /// Create a `Transport` error
    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport(message.into())
    }
}
