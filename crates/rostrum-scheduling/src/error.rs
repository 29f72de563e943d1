//! Error types for scheduling operations.

use thiserror::Error;

/// Result type for scheduling operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in scheduling operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Slot regeneration attempted after the lock tripped.
    ///
    /// Rejected loudly rather than ignored: published slot ids are
    /// referenced by existing votes and must not be invalidated once enough
    /// people have committed.
    #[error("Slot generation is locked for topic {0}")]
    Locked(String),

    /// Explicit confirmation by someone other than the owner
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Confirmation referenced a slot that is not published
    #[error("Unknown slot {slot} for topic {topic}")]
    UnknownSlot { topic: String, slot: String },

    /// Topic error
    #[error(transparent)]
    Topic(#[from] rostrum_topics::Error),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] rostrum_store::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
