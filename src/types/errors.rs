//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context. Per-test failures never show up here:
//! they are folded into [`Measurement`](crate::suite::Measurement) sentinels by
//! the scheduler. Only run-level failures propagate as `Error`.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the benchmark engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Start signal received while a run is already in progress.
    #[error("state transition error: {0}")]
    StateTransition(String),

    /// The suite's setup code threw; fatal for the whole run.
    #[error("setup code failed: {0}")]
    Setup(String),

    /// An execution unit could not be driven (missing pipes, closed pool).
    #[error("sandbox error: {0}")]
    Sandbox(String),

    /// A token or stored text could not be turned back into a suite.
    #[error("codec error: {0}")]
    Codec(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Token alphabet errors.
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// I/O errors (spawning units, compression streams).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::StateTransition(_) => "FAILED_PRECONDITION",
            Error::Setup(_) => "SETUP_FAILED",
            Error::Sandbox(_) => "SANDBOX",
            Error::Codec(_) | Error::Base64(_) => "INVALID_TOKEN",
            Error::Serialization(_) => "INTERNAL",
            Error::Io(_) => "UNAVAILABLE",
        }
    }
}

// Convenience constructors
impl Error {
    pub fn state_transition(msg: impl Into<String>) -> Self {
        Self::StateTransition(msg.into())
    }

    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }

    pub fn sandbox(msg: impl Into<String>) -> Self {
        Self::Sandbox(msg.into())
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }
}
