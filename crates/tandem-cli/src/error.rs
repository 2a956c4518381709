//! Error types for the demo.

use thiserror::Error;

/// Result type for demo operations.
pub type Result<T> = std::result::Result<T, DemoError>;

/// Errors that end a demo run.
#[derive(Debug, Error)]
pub enum DemoError {
    #[error("failed to read run configuration {path}: {source}")]
    ReadConfig {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid run configuration: {0}")]
    ParseConfig(#[from] serde_json::Error),

    #[error("failed to create diagnostics file: {0}")]
    Diagnostics(std::io::Error),

    #[error("participant {participant} failed: {source}")]
    Participant {
        participant: String,
        source: tandem_scheme::Error,
    },

    #[error("participant thread {0} panicked")]
    Panicked(String),
}
