//! Core aggregate and domain event traits.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense. Each event knows
/// the stream it belongs to and the stream version it produced.
pub trait DomainEvent: std::fmt::Debug + Clone + Send + Sync {
    /// Stable type name, stored alongside the payload.
    fn event_type(&self) -> &'static str;

    /// Payload schema version this event is encoded with.
    fn schema_version(&self) -> i32;

    fn aggregate_id(&self) -> AggregateId;

    /// Version of the aggregate after this event.
    fn version(&self) -> Version;

    fn occurred_at(&self) -> DateTime<Utc>;

    /// Serializes the variant-specific payload (without the type tag).
    fn to_payload(&self) -> serde_json::Result<serde_json::Value>;
}

/// Trait for aggregates in an event-sourced system.
///
/// An aggregate is rebuilt by replaying its events. Commands never mutate an
/// aggregate in place: they return an [`Outcome`] holding the new state and
/// the events that produced it.
pub trait Aggregate: std::fmt::Debug + Clone + Send + Sync + Sized {
    type Event: DomainEvent;

    type Error: std::error::Error + Send + Sync;

    /// Aggregate type name, used to tag stored events.
    fn aggregate_type() -> &'static str;

    fn id(&self) -> AggregateId;

    /// Version of the last applied event.
    fn version(&self) -> Version;

    /// Folds one event into the state.
    ///
    /// Must be pure and deterministic, and must not fail: events are facts
    /// that already happened. Validation belongs to the commands and to
    /// [`Aggregate::reconstitute`].
    fn apply(&mut self, event: Self::Event);

    /// Rebuilds an aggregate from its full, ordered history.
    fn reconstitute(events: impl IntoIterator<Item = Self::Event>) -> Result<Self, Self::Error>;
}

/// Result of a command: the state after the command and the events it
/// produced, in order.
///
/// [`Outcome::events`] inspects the produced events; [`Outcome::into_parts`]
/// hands them over exactly once for persistence.
#[derive(Debug, Clone)]
pub struct Outcome<A: Aggregate> {
    state: A,
    events: Vec<A::Event>,
}

impl<A: Aggregate> Outcome<A> {
    /// A command that decided nothing needs to change.
    pub fn unchanged(state: A) -> Self {
        Self {
            state,
            events: Vec::new(),
        }
    }

    /// Applies `events` to `state` and keeps them as the produced events.
    pub fn applied(mut state: A, events: Vec<A::Event>) -> Self {
        for event in &events {
            state.apply(event.clone());
        }
        Self { state, events }
    }

    /// Wraps a state that was built from `events` already.
    pub(crate) fn from_parts(state: A, events: Vec<A::Event>) -> Self {
        Self { state, events }
    }

    pub fn state(&self) -> &A {
        &self.state
    }

    pub fn events(&self) -> &[A::Event] {
        &self.events
    }

    pub fn is_unchanged(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_state(self) -> A {
        self.state
    }

    pub fn into_parts(self) -> (A, Vec<A::Event>) {
        (self.state, self.events)
    }
}
