//! In-memory event store for tests, benches and the worker without a database.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventId, EventQuery, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

/// In-memory event store used by tests, benches and the worker's demo mode.
///
/// Behaves like the PostgreSQL implementation: same ordering, same
/// uniqueness and expected-version checks, sequence numbers starting at 1.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Inserts envelopes as-is, keeping their schema version and payload.
    ///
    /// Bypasses the version checks; meant for seeding legacy data in tests.
    pub async fn import(&self, envelopes: Vec<EventEnvelope>) {
        let mut store = self.events.write().await;
        for mut envelope in envelopes {
            envelope.sequence = store.len() as i64 + 1;
            store.push(envelope);
        }
    }
}

fn in_store_order(events: &[EventEnvelope]) -> Vec<EventEnvelope> {
    let mut ordered = events.to_vec();
    ordered.sort_by(|a, b| a.global_order(b));
    ordered
}

/// Events strictly after `position`, in store order.
fn after_position(events: &[EventEnvelope], position: Option<EventId>) -> Result<Vec<EventEnvelope>> {
    let ordered = in_store_order(events);
    let Some(position) = position else {
        return Ok(ordered);
    };

    let boundary = ordered
        .iter()
        .find(|e| e.event_id == position)
        .cloned()
        .ok_or(EventStoreError::UnknownPosition(position))?;

    Ok(ordered.into_iter().filter(|e| e.is_after(&boundary)).collect())
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        mut events: Vec<EventEnvelope>,
        options: AppendOptions,
    ) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let first_new_version = events[0].version;

        let mut store = self.events.write().await;

        let current_version = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max()
            .unwrap_or(Version::initial());

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current_version,
            });
        }

        // (aggregate_id, version) uniqueness
        if first_new_version <= current_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version.unwrap_or(current_version),
                actual: current_version,
            });
        }
        if first_new_version != current_version.next() {
            return Err(EventStoreError::InvalidAppend(format!(
                "stream {aggregate_id} is at version {current_version}, cannot append version {first_new_version}"
            )));
        }

        let mut sequence = store.len() as i64;
        for event in &mut events {
            sequence += 1;
            event.sequence = sequence;
        }

        let last_version = events
            .last()
            .map(|e| e.version)
            .unwrap_or(current_version);
        let appended = events.len();
        store.extend(events);

        metrics::counter!("event_store_appends_total").increment(1);
        tracing::debug!(%aggregate_id, %last_version, appended, "events appended");

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let store = self.events.read().await;
        Ok(store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max())
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let events = in_store_order(&store)
            .into_iter()
            .filter(|e| query.matches(e))
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(events)
    }

    async fn events_after(
        &self,
        position: Option<EventId>,
        limit: usize,
    ) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let mut events = after_position(&store, position)?;
        events.truncate(limit);
        Ok(events)
    }

    async fn latest_event(&self) -> Result<Option<EventEnvelope>> {
        let store = self.events.read().await;
        Ok(store.iter().max_by(|a, b| a.global_order(b)).cloned())
    }

    async fn count_events_after(&self, position: Option<EventId>) -> Result<u64> {
        let store = self.events.read().await;
        Ok(after_position(&store, position)?.len() as u64)
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let store = self.events.read().await;
        let events = in_store_order(&store);
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}
