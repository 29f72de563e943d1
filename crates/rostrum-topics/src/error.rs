//! Error types for topic operations.

use crate::models::Stage;
use thiserror::Error;

/// Result type for topic operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in topic operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed topic fields
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Mutation of an owner-only field by a non-owner
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Stage regression or skip attempted
    #[error("Invalid stage transition from {from:?} to {to:?}")]
    InvalidTransition { from: Stage, to: Stage },

    /// No record at the topic's path
    #[error("Topic not found: {0}")]
    NotFound(String),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] rostrum_store::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
