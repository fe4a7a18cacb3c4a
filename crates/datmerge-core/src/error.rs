//! Error types for index operations.

use thiserror::Error;

/// Errors surfaced by the bucketing engine.
///
/// Catalog data problems never appear here; they are folded into nodump or
/// unknown-size states on the entry itself.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A pass was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The worker pool could not be created.
    #[error("Failed to build worker pool: {message}")]
    ThreadPool { message: String },

    /// A bucketing strategy name was not recognized.
    #[error("Unknown bucketing strategy: {name}")]
    UnknownStrategy { name: String },

    /// A dedupe scope name was not recognized.
    #[error("Unknown dedupe scope: {name}")]
    UnknownDedupeScope { name: String },
}

impl IndexError {
    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
