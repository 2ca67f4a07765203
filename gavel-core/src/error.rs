//! Error types for gavel-core

use thiserror::Error;

/// Main error type for the gavel-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Historical fetch or console submission failed
    #[error("network error: {0}")]
    Network(String),

    /// Push channel reported a failure
    #[error("stream error: {0}")]
    Stream(String),

    /// Reveal request rejected or its audit call failed
    #[error("reveal error: {0}")]
    Reveal(String),

    /// Submission rejected before any network call
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures that are expected to recover on their own or via
    /// a user retry (network and stream conditions).
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Stream(_))
    }
}

/// Result type alias for gavel-core
pub type Result<T> = std::result::Result<T, Error>;
