use thiserror::Error;

use crate::{AggregateId, EventId, Version};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The expected version did not match the stream's current version, or
    /// the `(aggregate_id, version)` uniqueness constraint rejected the append.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The batch handed to `append` is malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// No decoder is registered for this event type and schema version.
    #[error("Unknown event schema: {event_type} v{schema_version} (event {event_id})")]
    UnknownEventSchema {
        event_id: EventId,
        event_type: String,
        schema_version: i32,
    },

    /// A catch-up cursor points at an event the store does not contain.
    #[error("Unknown position: event {0} is not in the store")]
    UnknownPosition(EventId),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
