//! Command handling infrastructure.

use std::collections::HashMap;
use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventId, EventStore, Version, VersionedEvent};

use crate::aggregate::{Aggregate, DomainEvent, Outcome};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

/// Trait for commands that can be executed against an aggregate.
///
/// Commands represent an intention to perform an action. They may be rejected
/// if the aggregate's current state doesn't allow the action.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AggregateId;
}

/// Handler for executing commands against aggregates.
///
/// The handler is responsible for:
/// 1. Loading the stream and decoding it through the event's schema table
/// 2. Reconstituting the aggregate and running the command
/// 3. Appending the produced events, expecting the version that was loaded
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
    A::Event: VersionedEvent,
    DomainError: From<A::Error>,
{
    /// Creates a new command handler with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate, returning None if its stream is empty.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let envelopes = self.store.get_events_for_aggregate(aggregate_id).await?;
        if envelopes.is_empty() {
            return Ok(None);
        }

        let registry = A::Event::schema_registry();
        let events = envelopes
            .iter()
            .map(|envelope| registry.decode(envelope))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(A::reconstitute(events)?))
    }

    /// Persists the outcome of a creation command.
    ///
    /// Fails with a concurrency conflict if the stream already has events.
    pub async fn create(&self, outcome: Outcome<A>) -> Result<CommandResult<A>, DomainError> {
        self.commit(Version::initial(), outcome).await
    }

    /// Executes a command against an existing aggregate and persists the
    /// resulting events.
    ///
    /// The command function receives the current aggregate state and returns
    /// either an outcome or an error.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Outcome<A>, A::Error>,
    {
        let aggregate =
            self.load(aggregate_id)
                .await?
                .ok_or_else(|| DomainError::AggregateNotFound {
                    aggregate_type: A::aggregate_type(),
                    aggregate_id: aggregate_id.to_string(),
                })?;

        let outcome = command_fn(&aggregate)?;
        self.commit(aggregate.version(), outcome).await
    }

    async fn commit(
        &self,
        loaded_version: Version,
        outcome: Outcome<A>,
    ) -> Result<CommandResult<A>, DomainError> {
        let (aggregate, events) = outcome.into_parts();

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events,
                new_version: loaded_version,
            });
        }

        let envelopes = Self::build_envelopes(&events)?;

        // Persist events with optimistic concurrency
        let options = if loaded_version == Version::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(loaded_version)
        };

        let new_version = self.store.append(envelopes, options).await?;

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    /// Builds event envelopes from domain events.
    fn build_envelopes(events: &[A::Event]) -> Result<Vec<EventEnvelope>, DomainError> {
        events
            .iter()
            .map(|event| -> Result<EventEnvelope, DomainError> {
                Ok(EventEnvelope {
                    event_id: EventId::new(),
                    event_type: event.event_type().to_string(),
                    schema_version: event.schema_version(),
                    aggregate_id: event.aggregate_id(),
                    aggregate_type: A::aggregate_type().to_string(),
                    version: event.version(),
                    timestamp: event.occurred_at(),
                    sequence: 0,
                    payload: event.to_payload()?,
                    metadata: HashMap::new(),
                })
            })
            .collect()
    }
}
