//! Error types for the load harness core.

use thiserror::Error;

/// Result type alias using LoadError.
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors raised while driving requests and persisting results.
///
/// None of these are retried. Request-side errors drop the sample; sink
/// errors lose a single line; neither stops the run.
#[derive(Debug, Error)]
pub enum LoadError {
    // === Request Errors ===
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Server returned HTTP {0}")]
    NonSuccessStatus(u16),

    #[error("Invalid response body: {0}")]
    ResponseParse(String),

    // === Sink Errors ===
    #[error("Failed to write result log: {0}")]
    SinkWrite(#[from] std::io::Error),

    #[error("Result log is already closed")]
    SinkClosed,

    // === Setup Errors ===
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for LoadError {
    fn from(err: reqwest::Error) -> Self {
        LoadError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        LoadError::ResponseParse(format!("JSON error: {}", err))
    }
}
