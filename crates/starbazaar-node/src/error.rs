//! Error types for the star node.

use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can stop the node.
#[derive(Debug, Error)]
pub enum Error {
    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] starbazaar_store::Error),

    /// Bad configuration value
    #[error("Invalid config {key}: {reason}")]
    Config { key: &'static str, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
