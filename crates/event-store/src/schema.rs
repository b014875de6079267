//! Schema-aware decoding of stored events.
//!
//! Every stored event records the `(event_type, schema_version)` it was encoded
//! with. A [`SchemaRegistry`] maps each pair to a decoder that turns the raw
//! payload into the current in-memory event shape, so payloads written under an
//! older schema stay readable after the event type evolves. A pair with no
//! decoder is an error: dropping an event silently would corrupt every
//! projection built from the log.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::{AggregateId, EventEnvelope, EventId, EventStoreError, Result, Version};

/// Decodes one payload into the current event shape.
pub type Decoder<E> = fn(serde_json::Value) -> serde_json::Result<E>;

/// Dispatch table from `(event_type, schema_version)` to a decoder.
pub struct SchemaRegistry<E> {
    decoders: HashMap<&'static str, BTreeMap<i32, Decoder<E>>>,
}

impl<E> SchemaRegistry<E> {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers the decoder for one schema version of an event type.
    ///
    /// Registering the same pair twice replaces the earlier decoder.
    pub fn register(
        mut self,
        event_type: &'static str,
        schema_version: i32,
        decoder: Decoder<E>,
    ) -> Self {
        self.decoders
            .entry(event_type)
            .or_default()
            .insert(schema_version, decoder);
        self
    }

    /// Returns true if a decoder exists for the pair.
    pub fn supports(&self, event_type: &str, schema_version: i32) -> bool {
        self.decoders
            .get(event_type)
            .is_some_and(|versions| versions.contains_key(&schema_version))
    }

    /// Highest registered schema version for an event type.
    pub fn latest_version(&self, event_type: &str) -> Option<i32> {
        self.decoders
            .get(event_type)
            .and_then(|versions| versions.keys().next_back().copied())
    }

    /// Number of registered `(event_type, schema_version)` pairs.
    pub fn len(&self) -> usize {
        self.decoders.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decodes an envelope's payload with the decoder registered for its
    /// event type and schema version.
    pub fn decode(&self, envelope: &EventEnvelope) -> Result<E> {
        let decoder = self
            .decoders
            .get(envelope.event_type.as_str())
            .and_then(|versions| versions.get(&envelope.schema_version))
            .ok_or_else(|| EventStoreError::UnknownEventSchema {
                event_id: envelope.event_id,
                event_type: envelope.event_type.clone(),
                schema_version: envelope.schema_version,
            })?;

        Ok(decoder(envelope.payload.clone())?)
    }
}

impl<E> Default for SchemaRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Event types that carry their own decode table.
pub trait VersionedEvent: Sized + Send + Sync + 'static {
    fn schema_registry() -> &'static SchemaRegistry<Self>;
}

/// A decoded event together with its storage metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent<E> {
    pub event_id: EventId,
    pub sequence: i64,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    pub version: Version,
    pub timestamp: DateTime<Utc>,
    pub event: E,
}

impl<E: VersionedEvent> StoredEvent<E> {
    /// Decodes an envelope through `E`'s schema registry.
    pub fn decode(envelope: &EventEnvelope) -> Result<Self> {
        let event = E::schema_registry().decode(envelope)?;
        Ok(Self {
            event_id: envelope.event_id,
            sequence: envelope.sequence,
            aggregate_id: envelope.aggregate_id,
            aggregate_type: envelope.aggregate_type.clone(),
            version: envelope.version,
            timestamp: envelope.timestamp,
            event,
        })
    }
}
