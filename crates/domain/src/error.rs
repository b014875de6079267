//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::product::ProductError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// A product command was rejected.
    #[error("Product error: {0}")]
    Product(#[from] ProductError),

    /// Aggregate not found.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// True for optimistic-concurrency failures, whether the aggregate or the
    /// store detected them.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. })
                | DomainError::Product(ProductError::ConcurrencyConflict { .. })
        )
    }
}
