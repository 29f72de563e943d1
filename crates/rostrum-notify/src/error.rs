//! Error types for notification storage.

use thiserror::Error;

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur reading or writing the notification inbox.
#[derive(Debug, Error)]
pub enum Error {
    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] rostrum_store::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
