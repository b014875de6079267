//! Projection processor feeding stored events to a projection.

use std::time::Duration;

use event_store::{EventId, EventQueryService, EventStore, StoredEvent};
use serde::Serialize;
use tokio::sync::watch;

use crate::Result;
use crate::projection::{Handled, Projection, ProjectionPosition};

/// Upper bound for the delay between retries of one event.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Lower bound for the polling period; a zero interval is rejected by tokio.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Tuning for a [`ProjectionProcessor`].
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Events fetched per query.
    pub batch_size: usize,

    /// Delay between catch-up passes in [`ProjectionProcessor::run`].
    pub poll_interval: Duration,

    /// Retries of a failing event before the pass gives up.
    pub max_retries: u32,

    /// Delay before the first retry; doubled for each further retry.
    pub retry_backoff: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            poll_interval: Duration::from_millis(500),
            max_retries: 3,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

/// How far a projection trails the log.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectionLag {
    pub position: ProjectionPosition,
    pub latest_event_id: Option<EventId>,
    pub events_behind: u64,
}

/// Drives one projection from the event log.
///
/// The processor supports:
/// - Catch-up: reads events strictly after the projection's last event id
/// - Rebuild: resets the projection and replays the whole log by offset
/// - Polling: repeats catch-up until told to stop
///
/// It must be the only writer for its projection: events are handled one at
/// a time in store order.
pub struct ProjectionProcessor<S, P>
where
    S: EventStore,
    P: Projection,
{
    events: EventQueryService<S, P::Event>,
    projection: P,
    config: ProcessorConfig,
}

impl<S, P> ProjectionProcessor<S, P>
where
    S: EventStore,
    P: Projection,
{
    pub fn new(store: S, projection: P) -> Self {
        Self::with_config(store, projection, ProcessorConfig::default())
    }

    pub fn with_config(store: S, projection: P, config: ProcessorConfig) -> Self {
        Self {
            events: EventQueryService::new(store),
            projection,
            config: ProcessorConfig {
                batch_size: config.batch_size.max(1),
                poll_interval: config.poll_interval.max(MIN_POLL_INTERVAL),
                ..config
            },
        }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Applies every event after the projection's position.
    ///
    /// Returns the number of events that advanced the position. Stops at the
    /// first event that still fails after retries; the position stays before
    /// it. A full batch that leaves the cursor where it was also ends the pass.
    #[tracing::instrument(skip(self), fields(projection = self.projection.name()))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let mut delivered = 0u64;

        loop {
            let position = self.projection.position().await?;
            let batch = self
                .events
                .find_events_after(position.last_event_id, self.config.batch_size)
                .await?;

            for event in &batch {
                if self.deliver(event).await?.advanced() {
                    delivered += 1;
                }
            }

            if batch.len() < self.config.batch_size {
                break;
            }

            let cursor = self.projection.position().await?.last_event_id;
            if cursor == position.last_event_id {
                tracing::warn!(
                    cursor = ?cursor,
                    batch = batch.len(),
                    "batch did not advance the projection, stopping catch-up"
                );
                break;
            }
        }

        if delivered > 0 {
            tracing::info!(events = delivered, "catch-up complete");
        }
        Ok(delivered)
    }

    /// Resets the projection and replays the log from the start.
    ///
    /// Pages by offset up to the newest event present when the rebuild
    /// started; events appended afterwards are left for the next catch-up.
    #[tracing::instrument(skip(self), fields(projection = self.projection.name()))]
    pub async fn rebuild(&self) -> Result<u64> {
        let Some(last) = self.events.store().latest_event().await? else {
            self.projection.reset().await?;
            return Ok(0);
        };
        self.projection.reset().await?;

        let mut delivered = 0u64;
        let mut offset = 0usize;
        'pages: loop {
            let page = self
                .events
                .find_all_events_ordered(self.config.batch_size, offset)
                .await?;

            for event in &page {
                self.deliver(event).await?;
                delivered += 1;
                if event.event_id == last.event_id {
                    break 'pages;
                }
            }

            if page.len() < self.config.batch_size {
                break;
            }
            offset += page.len();
        }

        tracing::info!(events = delivered, "rebuild complete");
        Ok(delivered)
    }

    /// Reports how many events the projection has yet to apply.
    pub async fn lag(&self) -> Result<ProjectionLag> {
        let position = self.projection.position().await?;
        let events_behind = self
            .events
            .count_events_after(position.last_event_id)
            .await?;
        let latest_event_id = self
            .events
            .store()
            .latest_event()
            .await?
            .map(|event| event.event_id);

        metrics::gauge!("projections_lag_events", "projection" => self.projection.name())
            .set(events_behind as f64);

        Ok(ProjectionLag {
            position,
            latest_event_id,
            events_behind,
        })
    }

    /// Polls for new events until `shutdown` flips to true or its sender is
    /// dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let name = self.projection.name();
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(projection = name, "projection processor started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_catch_up().await {
                        tracing::error!(projection = name, error = %e, "catch-up failed");
                    }
                    if let Err(e) = self.lag().await {
                        tracing::warn!(projection = name, error = %e, "lag check failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!(projection = name, "projection processor stopped");
    }

    /// Hands one event to the projection, retrying with exponential backoff.
    async fn deliver(&self, event: &StoredEvent<P::Event>) -> Result<Handled> {
        let mut backoff = self.config.retry_backoff;
        let mut attempt = 0u32;

        loop {
            match self.projection.handle(event).await {
                Ok(handled) => return Ok(handled),
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        event_id = %event.event_id,
                        sequence = event.sequence,
                        attempt,
                        error = %e,
                        "projection failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_RETRY_BACKOFF);
                }
                Err(e) => {
                    tracing::error!(
                        event_id = %event.event_id,
                        sequence = event.sequence,
                        error = %e,
                        "projection failed, giving up"
                    );
                    metrics::counter!("projections_events_failed").increment(1);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProjectionError;
    use async_trait::async_trait;
    use chrono::Utc;
    use common::AggregateId;
    use event_store::{
        AppendOptions, EventEnvelope, InMemoryEventStore, SchemaRegistry, Version, VersionedEvent,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, LazyLock};
    use tokio::sync::RwLock;

    #[derive(Debug, Clone, serde::Deserialize)]
    struct Tick {
        n: i64,
    }

    static TICKS: LazyLock<SchemaRegistry<Tick>> =
        LazyLock::new(|| SchemaRegistry::new().register("Tick", 1, serde_json::from_value));

    impl VersionedEvent for Tick {
        fn schema_registry() -> &'static SchemaRegistry<Self> {
            &TICKS
        }
    }

    /// Sums ticks; fails the first `failures` deliveries.
    #[derive(Default)]
    struct SumProjection {
        sum: Arc<RwLock<i64>>,
        position: Arc<RwLock<Option<ProjectionPosition>>>,
        failures: AtomicU32,
    }

    #[async_trait]
    impl Projection for SumProjection {
        type Event = Tick;

        fn name(&self) -> &'static str {
            "sum"
        }

        async fn handle(&self, event: &StoredEvent<Tick>) -> crate::Result<Handled> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(ProjectionError::Store("unavailable".into()));
            }
            let current = self.position().await?;
            if current.has_applied(event.timestamp, event.event_id) {
                return Ok(Handled::Duplicate);
            }
            *self.sum.write().await += event.event.n;
            *self.position.write().await =
                Some(current.advance(event.event_id, event.timestamp, event.sequence));
            Ok(Handled::Applied)
        }

        async fn position(&self) -> crate::Result<ProjectionPosition> {
            Ok(self
                .position
                .read()
                .await
                .clone()
                .unwrap_or_else(|| ProjectionPosition::zero("sum")))
        }

        async fn reset(&self) -> crate::Result<()> {
            *self.sum.write().await = 0;
            *self.position.write().await = None;
            Ok(())
        }
    }

    fn config(batch_size: usize) -> ProcessorConfig {
        ProcessorConfig {
            batch_size,
            poll_interval: Duration::from_millis(10),
            max_retries: 2,
            retry_backoff: Duration::from_millis(1),
        }
    }

    async fn append_ticks(store: &InMemoryEventStore, values: &[i64]) {
        let id = AggregateId::new();
        let events = values
            .iter()
            .enumerate()
            .map(|(i, n)| {
                EventEnvelope::builder()
                    .aggregate_id(id)
                    .aggregate_type("Counter")
                    .event_type("Tick")
                    .version(Version::new(i as i64 + 1))
                    .timestamp(Utc::now())
                    .payload(serde_json::json!({ "n": n }))
                    .build()
                    .unwrap()
            })
            .collect();
        store.append(events, AppendOptions::expect_new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_catch_up_processes_all_events_in_batches() {
        let store = InMemoryEventStore::new();
        append_ticks(&store, &[1, 2, 3, 4, 5]).await;

        let processor =
            ProjectionProcessor::with_config(store, SumProjection::default(), config(2));
        assert_eq!(processor.run_catch_up().await.unwrap(), 5);
        assert_eq!(*processor.projection().sum.read().await, 15);

        // Nothing new on the second pass.
        assert_eq!(processor.run_catch_up().await.unwrap(), 0);
        assert_eq!(*processor.projection().sum.read().await, 15);
    }

    #[tokio::test]
    async fn test_catch_up_resumes_from_position() {
        let store = InMemoryEventStore::new();
        append_ticks(&store, &[1, 2]).await;

        let processor =
            ProjectionProcessor::with_config(store.clone(), SumProjection::default(), config(10));
        processor.run_catch_up().await.unwrap();

        append_ticks(&store, &[10, 20]).await;
        assert_eq!(processor.run_catch_up().await.unwrap(), 2);
        assert_eq!(*processor.projection().sum.read().await, 33);
        assert_eq!(
            processor.projection().position().await.unwrap().events_processed,
            4
        );
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let store = InMemoryEventStore::new();
        append_ticks(&store, &[7]).await;

        let projection = SumProjection {
            failures: AtomicU32::new(2),
            ..Default::default()
        };
        let processor = ProjectionProcessor::with_config(store, projection, config(10));
        assert_eq!(processor.run_catch_up().await.unwrap(), 1);
        assert_eq!(*processor.projection().sum.read().await, 7);
    }

    #[tokio::test]
    async fn test_persistent_failure_leaves_position() {
        let store = InMemoryEventStore::new();
        append_ticks(&store, &[7]).await;

        let projection = SumProjection {
            failures: AtomicU32::new(10),
            ..Default::default()
        };
        let processor = ProjectionProcessor::with_config(store, projection, config(10));
        assert!(processor.run_catch_up().await.is_err());
        assert!(processor.projection().position().await.unwrap().is_zero());
        assert_eq!(processor.lag().await.unwrap().events_behind, 1);
    }

    #[tokio::test]
    async fn test_rebuild_resets_and_replays() {
        let store = InMemoryEventStore::new();
        append_ticks(&store, &[1, 2, 3]).await;

        let processor =
            ProjectionProcessor::with_config(store, SumProjection::default(), config(2));
        processor.run_catch_up().await.unwrap();
        let before = processor.projection().position().await.unwrap();

        assert_eq!(processor.rebuild().await.unwrap(), 3);
        assert_eq!(*processor.projection().sum.read().await, 6);
        let after = processor.projection().position().await.unwrap();
        assert_eq!(after.last_event_id, before.last_event_id);
        assert_eq!(after.events_processed, 3);
    }

    #[tokio::test]
    async fn test_lag_counts_pending_events() {
        let store = InMemoryEventStore::new();
        let processor =
            ProjectionProcessor::with_config(store.clone(), SumProjection::default(), config(10));

        let lag = processor.lag().await.unwrap();
        assert_eq!(lag.events_behind, 0);
        assert!(lag.latest_event_id.is_none());

        append_ticks(&store, &[1, 1, 1]).await;
        assert_eq!(processor.lag().await.unwrap().events_behind, 3);

        processor.run_catch_up().await.unwrap();
        let lag = processor.lag().await.unwrap();
        assert_eq!(lag.events_behind, 0);
        assert_eq!(lag.latest_event_id, lag.position.last_event_id);
    }

    /// Never moves its position, like a projection whose cursor disagrees
    /// with the store.
    struct StuckProjection;

    #[async_trait]
    impl Projection for StuckProjection {
        type Event = Tick;

        fn name(&self) -> &'static str {
            "stuck"
        }

        async fn handle(&self, _event: &StoredEvent<Tick>) -> crate::Result<Handled> {
            Ok(Handled::Duplicate)
        }

        async fn position(&self) -> crate::Result<ProjectionPosition> {
            Ok(ProjectionPosition::zero("stuck"))
        }

        async fn reset(&self) -> crate::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_catch_up_ends_when_batch_does_not_advance() {
        let store = InMemoryEventStore::new();
        append_ticks(&store, &[1, 2, 3]).await;

        let processor = ProjectionProcessor::with_config(store, StuckProjection, config(1));
        let delivered = tokio::time::timeout(Duration::from_secs(3), processor.run_catch_up())
            .await
            .expect("catch-up must return")
            .unwrap();
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_zero_poll_interval_is_clamped() {
        let store = InMemoryEventStore::new();
        append_ticks(&store, &[3]).await;

        let processor = Arc::new(ProjectionProcessor::with_config(
            store,
            SumProjection::default(),
            ProcessorConfig {
                poll_interval: Duration::ZERO,
                ..config(10)
            },
        ));
        assert!(processor.config().poll_interval > Duration::ZERO);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn({
            let processor = Arc::clone(&processor);
            async move { processor.run(rx).await }
        });
        tokio::time::timeout(Duration::from_secs(5), async {
            while *processor.projection().sum.read().await != 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = InMemoryEventStore::new();
        append_ticks(&store, &[4, 5]).await;

        let processor = Arc::new(ProjectionProcessor::with_config(
            store,
            SumProjection::default(),
            config(10),
        ));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn({
            let processor = Arc::clone(&processor);
            async move { processor.run(rx).await }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while *processor.projection().sum.read().await != 9 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
