//! Error types for Persona.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Store errors
    #[error("Store error: {0}")]
    Store(String),

    #[error("Store operation timed out after {millis}ms")]
    StoreTimeout { millis: u64 },

    // Inference errors
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider response rejected: {0}")]
    Normalize(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl Error {
    /// Whether this error came from the caller rather than from a dependency.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Error::InvalidRequest(_))
    }
}
