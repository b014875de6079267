//! Append-only event storage and ordered, schema-aware event retrieval.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod query_service;
pub mod schema;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use query::EventQuery;
pub use query_service::EventQueryService;
pub use schema::{Decoder, SchemaRegistry, StoredEvent, VersionedEvent};
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
