//! Read-only, ordered retrieval of decoded events for projections.

use std::marker::PhantomData;

use crate::{EventId, EventQuery, EventStore, Result, StoredEvent, VersionedEvent};

/// Ordered-retrieval facade over an [`EventStore`].
///
/// Stateless: every method is a repeatable read and may run concurrently.
/// Each event is decoded through `E`'s schema registry, so an event with an
/// unknown `(event_type, schema_version)` fails the whole call.
pub struct EventQueryService<S, E> {
    store: S,
    _event: PhantomData<fn() -> E>,
}

impl<S: Clone, E> Clone for EventQueryService<S, E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _event: PhantomData,
        }
    }
}

impl<S, E> EventQueryService<S, E>
where
    S: EventStore,
    E: VersionedEvent,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _event: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Up to `limit` events strictly after `position`, or from the start of
    /// history when `position` is `None`. Steady-state catch-up uses this.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn find_events_after(
        &self,
        position: Option<EventId>,
        limit: usize,
    ) -> Result<Vec<StoredEvent<E>>> {
        let envelopes = self.store.events_after(position, limit).await?;
        envelopes.iter().map(StoredEvent::decode).collect()
    }

    /// One offset page of the whole history, for full rebuilds.
    ///
    /// Offsets shift when events with earlier timestamps are appended during
    /// the traversal, so this is not safe for steady-state catch-up.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn find_all_events_ordered(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StoredEvent<E>>> {
        let envelopes = self
            .store
            .query_events(EventQuery::page(limit, offset))
            .await?;
        envelopes.iter().map(StoredEvent::decode).collect()
    }

    /// The most recent event in the store.
    pub async fn get_latest_event(&self) -> Result<Option<StoredEvent<E>>> {
        self.store
            .latest_event()
            .await?
            .as_ref()
            .map(StoredEvent::decode)
            .transpose()
    }

    /// Number of events after `position`, without decoding them.
    pub async fn count_events_after(&self, position: Option<EventId>) -> Result<u64> {
        self.store.count_events_after(position).await
    }
}
