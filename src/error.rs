//! Error types for slidegate.

use thiserror::Error;

/// Main error type for slidegate operations.
#[derive(Error, Debug)]
pub enum SlidegateError {
    /// Limiter parameters that can never admit a request
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Configuration source could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for slidegate operations.
pub type Result<T> = std::result::Result<T, SlidegateError>;
