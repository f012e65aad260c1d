//! Error types for taskweave.
//!
//! Every core operation either produces a value or one of the three
//! operation-level kinds below. The remaining variants cover the ambient
//! layers (configuration, HTTP, telemetry setup).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The underlying work signaled an application-level failure.
    #[error("operation failed: {0}")]
    OperationFailed(String),

    /// Cooperative cancellation was observed at a checkpoint.
    #[error("operation cancelled")]
    Cancelled,

    /// An internal precondition did not hold. Programmer error.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// A web request failed in transport or returned a non-success status.
    #[error("http error: {0}")]
    Http(String),

    /// Anything else, e.g. telemetry setup.
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::OperationFailed(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolated(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
