//! Error types for the graph store.

use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed graph path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Connectivity to the store is lost; state is unknown.
    ///
    /// The core never assumes a write succeeded without observing it echoed
    /// back through a subscription, so this is surfaced, not retried here.
    #[error("Store unreachable: {0}")]
    Disconnected(String),
}
