//! Projection error types.

use thiserror::Error;

/// Errors that can occur during projection processing.
///
/// None of these advance a projection's position: the failed event is
/// delivered again on the next attempt.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// Reading or decoding events failed.
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// The read model or position store failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Failed to (de)serialize a stored record.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
