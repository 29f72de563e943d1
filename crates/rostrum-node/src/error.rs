//! Error types for node operations.

use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in node operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Topic error
    #[error(transparent)]
    Topic(#[from] rostrum_topics::Error),

    /// Scheduling error
    #[error(transparent)]
    Scheduling(#[from] rostrum_scheduling::Error),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] rostrum_store::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
