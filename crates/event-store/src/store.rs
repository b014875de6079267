use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventId, EventQuery, EventStoreError, Result, Version};

/// Options for appending events to the store.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected version of the stream before the append.
    /// If None, no version check is performed; the `(stream, version)`
    /// uniqueness constraint still applies.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Expects the stream to have no events yet.
    pub fn expect_new() -> Self {
        Self::expect_version(Version::initial())
    }
}

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Durable, append-only event log.
///
/// Every read that spans more than one stream returns events in store order:
/// ascending timestamp, ties broken by ascending event id.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events to one stream atomically and assigns their sequence
    /// numbers.
    ///
    /// Fails with `ConcurrencyConflict` if `options.expected_version` does not
    /// match the stream, or if any `(aggregate_id, version)` pair already
    /// exists. Returns the stream's version after the append.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version>;

    /// All events of one stream in version order.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Current version of a stream, `None` if it has no events.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Events matching a query, in store order.
    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>>;

    /// Up to `limit` events strictly after `position` in store order, or from
    /// the start of the log when `position` is `None`.
    ///
    /// Fails with `UnknownPosition` if `position` is not in the store.
    async fn events_after(
        &self,
        position: Option<EventId>,
        limit: usize,
    ) -> Result<Vec<EventEnvelope>>;

    /// The last event in store order.
    async fn latest_event(&self) -> Result<Option<EventEnvelope>>;

    /// Number of events strictly after `position` (all events for `None`).
    async fn count_events_after(&self, position: Option<EventId>) -> Result<u64>;

    /// Streams the whole log in store order.
    async fn stream_all_events(&self) -> Result<EventStream>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    async fn append_event(&self, event: EventEnvelope, options: AppendOptions) -> Result<Version> {
        self.append(vec![event], options).await
    }

    /// Checks if an aggregate exists (has any events).
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Checks that a batch targets one stream with gapless ascending versions.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty event list".to_string(),
        ));
    };

    if first.version < Version::first() {
        return Err(EventStoreError::InvalidAppend(format!(
            "event versions start at 1, got {}",
            first.version
        )));
    }

    let mut expected_version = first.version;
    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidAppend(
                "all events must belong to the same aggregate".to_string(),
            ));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidAppend(
                "all events must have the same aggregate type".to_string(),
            ));
        }
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "event versions must be sequential: expected {expected_version}, got {}",
                event.version
            )));
        }
    }

    Ok(())
}
