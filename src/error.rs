//! Custom error types for bibnotes.
//!
//! This module defines all error types used throughout the application.
//! All functions return `Result<T, BibnotesError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for bibnotes operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
#[derive(Debug, Error)]
pub enum BibnotesError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Registry returned an error status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code from the registry
        code: i32,
        /// Error message from the registry
        message: String,
    },

    /// Response body could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using `BibnotesError`
pub type Result<T> = std::result::Result<T, BibnotesError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| BibnotesError::Parse(msg.to_string()))
    }
}
