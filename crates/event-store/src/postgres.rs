//! PostgreSQL event store.
//!
//! Events live in one `events` table (see `migrations/`). Store order is
//! `(timestamp, id)`; `sequence` is a `BIGSERIAL` in append order.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventQuery, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

const EVENT_COLUMNS: &str = "id, sequence, event_type, schema_version, aggregate_id, aggregate_type, version, timestamp, payload, metadata";

/// PostgreSQL-backed event store.
///
/// The `unique_aggregate_version` constraint is the authoritative
/// concurrency check; the expected-version read inside the append
/// transaction only produces a nicer error earlier.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the embedded migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            schema_version: row.try_get("schema_version")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            sequence: row.try_get("sequence")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }

    /// Store-order key of the event at `position`.
    async fn boundary(&self, position: EventId) -> Result<(DateTime<Utc>, Uuid)> {
        let timestamp: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT timestamp FROM events WHERE id = $1")
                .bind(position.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        timestamp
            .map(|ts| (ts, position.as_uuid()))
            .ok_or(EventStoreError::UnknownPosition(position))
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let mut tx = self.pool.begin().await?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&mut *tx)
                .await?;
        let current_version = Version::new(current_version.unwrap_or(0));

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current_version,
            });
        }

        let first_new_version = events[0].version;
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

        let mut last_version = Version::initial();
        for event in &events {
            let metadata_json = serde_json::to_value(&event.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO events (id, event_type, schema_version, aggregate_id, aggregate_type, version, timestamp, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(&event.event_type)
            .bind(event.schema_version)
            .bind(event.aggregate_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(event.version.as_i64())
            .bind(event.timestamp)
            .bind(&event.payload)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_aggregate_version")
                {
                    return EventStoreError::ConcurrencyConflict {
                        aggregate_id,
                        expected: options.expected_version.unwrap_or(Version::initial()),
                        actual: event.version,
                    };
                }
                EventStoreError::Database(e)
            })?;

            last_version = event.version;
        }

        tx.commit().await?;

        metrics::counter!("event_store_appends_total").increment(1);
        tracing::debug!(%aggregate_id, %last_version, appended = events.len(), "events appended");

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE aggregate_id = $1 ORDER BY version ASC"
        ))
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let mut sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE 1=1");
        let mut param_count = 0;

        if query.aggregate_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND aggregate_id = ${param_count}"));
        }
        if query.aggregate_type.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND aggregate_type = ${param_count}"));
        }
        if query.event_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_type = ANY(${param_count})"));
        }

        sql.push_str(" ORDER BY timestamp ASC, id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.aggregate_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(agg_type) = query.aggregate_type {
            sqlx_query = sqlx_query.bind(agg_type);
        }
        if let Some(event_types) = query.event_types {
            sqlx_query = sqlx_query.bind(event_types);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn events_after(
        &self,
        position: Option<EventId>,
        limit: usize,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = match position {
            None => {
                sqlx::query(&format!(
                    "SELECT {EVENT_COLUMNS} FROM events ORDER BY timestamp ASC, id ASC LIMIT $1"
                ))
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            Some(position) => {
                let (timestamp, id) = self.boundary(position).await?;
                sqlx::query(&format!(
                    "SELECT {EVENT_COLUMNS} FROM events WHERE (timestamp, id) > ($1, $2) ORDER BY timestamp ASC, id ASC LIMIT $3"
                ))
                .bind(timestamp)
                .bind(id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn latest_event(&self) -> Result<Option<EventEnvelope>> {
        let row = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY timestamp DESC, id DESC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_event).transpose()
    }

    async fn count_events_after(&self, position: Option<EventId>) -> Result<u64> {
        let count: i64 = match position {
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM events")
                    .fetch_one(&self.pool)
                    .await?
            }
            Some(position) => {
                let (timestamp, id) = self.boundary(position).await?;
                sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE (timestamp, id) > ($1, $2)")
                    .bind(timestamp)
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        Ok(count as u64)
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        // Materialized first: a row stream would borrow the pool past this call.
        let events = self.query_events(EventQuery::new()).await?;
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}
