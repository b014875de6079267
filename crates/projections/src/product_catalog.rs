//! Product catalog projection.
//!
//! Folds product events into [`ProductReadModel`] records. Two guards make
//! redelivery harmless:
//!
//! - events at or before the stored cursor in store order
//!   (`(timestamp, event_id)`, the order catch-up reads in) are ignored
//!   outright;
//! - every handler except `ProductCreated` applies only when the event's
//!   version is above the record's `aggregate_version`.
//!
//! The read-model write always completes before the position is saved, so a
//! crash between the two re-delivers an event whose effect is already
//! visible, and the version guard turns that into a no-op.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{DomainEvent, ProductEvent, ProductStatus};
use event_store::{EventId, StoredEvent, Version};

use crate::Result;
use crate::projection::{Handled, Projection, ProjectionPosition};
use crate::read_model::ProductReadModel;
use crate::store::{PositionStore, ProductReadModelStore};

/// Name under which the catalog position is stored.
pub const PRODUCT_CATALOG: &str = "product-catalog";

/// Projection maintaining the product catalog read model.
#[derive(Clone)]
pub struct ProductCatalogProjector<R, P> {
    read_models: R,
    positions: P,
}

impl<R, P> ProductCatalogProjector<R, P>
where
    R: ProductReadModelStore,
    P: PositionStore,
{
    pub fn new(read_models: R, positions: P) -> Self {
        Self {
            read_models,
            positions,
        }
    }

    pub fn read_models(&self) -> &R {
        &self.read_models
    }

    /// Applies one event and advances the position past it, keyed by the
    /// event's `occurred_at`, which is the store timestamp for events written
    /// through the command handler.
    pub async fn process_event(
        &self,
        event: &ProductEvent,
        event_id: EventId,
        sequence: i64,
    ) -> Result<Handled> {
        self.process_event_at(event, event_id, event.occurred_at(), sequence)
            .await
    }

    /// Applies one event whose store key is `(timestamp, event_id)`.
    ///
    /// Events at or before the cursor return [`Handled::Duplicate`] without
    /// touching anything. Errors leave the position where it was.
    #[tracing::instrument(
        skip(self, event),
        fields(event_type = event.event_type(), product_id = %event.product_id())
    )]
    pub async fn process_event_at(
        &self,
        event: &ProductEvent,
        event_id: EventId,
        timestamp: DateTime<Utc>,
        sequence: i64,
    ) -> Result<Handled> {
        let position = self.projection_position().await?;
        if position.has_applied(timestamp, event_id) {
            tracing::debug!(%event_id, cursor = %position, "already applied");
            metrics::counter!("projections_events_skipped", "reason" => "duplicate").increment(1);
            return Ok(Handled::Duplicate);
        }

        let applied = match event {
            ProductEvent::ProductCreated(data) => {
                self.read_models
                    .upsert(ProductReadModel::from_created(data, event_id))
                    .await?;
                true
            }
            ProductEvent::ProductUpdated(data) => {
                self.apply_to_record(event, event_id, data.occurred_at, |record| {
                    record.name = data.name.clone();
                    record.description = data.description.clone();
                })
                .await?
            }
            ProductEvent::ProductPriceChanged(data) => {
                self.apply_to_record(event, event_id, data.occurred_at, |record| {
                    record.price_cents = data.new_price.cents();
                })
                .await?
            }
            ProductEvent::ProductActivated(data) => {
                self.apply_to_record(event, event_id, data.occurred_at, |record| {
                    record.status = ProductStatus::Active;
                })
                .await?
            }
            ProductEvent::ProductDiscontinued(data) => {
                self.apply_to_record(event, event_id, data.occurred_at, |record| {
                    record.status = ProductStatus::Discontinued;
                    record.discontinue_reason = data.reason.clone();
                })
                .await?
            }
            ProductEvent::ProductDeleted(data) => {
                self.apply_to_record(event, event_id, data.occurred_at, |record| {
                    record.deleted_at = Some(data.occurred_at);
                })
                .await?
            }
        };

        self.positions
            .save(position.advance(event_id, timestamp, sequence))
            .await?;

        metrics::counter!("projections_events_processed").increment(1);
        if applied {
            Ok(Handled::Applied)
        } else {
            metrics::counter!("projections_events_skipped", "reason" => "stale").increment(1);
            Ok(Handled::Skipped)
        }
    }

    /// Current cursor, or the zero state if the projection never ran.
    pub async fn projection_position(&self) -> Result<ProjectionPosition> {
        Ok(self
            .positions
            .load(PRODUCT_CATALOG)
            .await?
            .unwrap_or_else(|| ProjectionPosition::zero(PRODUCT_CATALOG)))
    }

    /// Clears the read model and saves the zero position.
    #[tracing::instrument(skip(self))]
    pub async fn reset(&self) -> Result<()> {
        self.read_models.clear().await?;
        self.positions
            .save(ProjectionPosition::zero(PRODUCT_CATALOG))
            .await?;
        tracing::info!("product catalog reset");
        Ok(())
    }

    /// Looks up one product record.
    pub async fn product(&self, product_id: AggregateId) -> Result<Option<ProductReadModel>> {
        self.read_models.get(product_id).await
    }

    /// Loads the record, applies `change` if the event is newer and writes it
    /// back. Returns false when the event was skipped.
    async fn apply_to_record<F>(
        &self,
        event: &ProductEvent,
        event_id: EventId,
        occurred_at: DateTime<Utc>,
        change: F,
    ) -> Result<bool>
    where
        F: FnOnce(&mut ProductReadModel) + Send,
    {
        let product_id = event.product_id();
        let version: Version = DomainEvent::version(event);

        let Some(mut record) = self.read_models.get(product_id).await? else {
            tracing::warn!(
                %product_id,
                %version,
                event_type = event.event_type(),
                "no catalog record for product, skipping event"
            );
            return Ok(false);
        };

        if !record.accepts(version) {
            tracing::debug!(
                %product_id,
                %version,
                record_version = %record.aggregate_version,
                "event older than record, skipping"
            );
            return Ok(false);
        }

        change(&mut record);
        record.aggregate_version = version;
        record.last_event_id = event_id;
        record.updated_at = occurred_at;
        record.refresh_derived();

        self.read_models.upsert(record).await?;
        Ok(true)
    }
}

#[async_trait]
impl<R, P> Projection for ProductCatalogProjector<R, P>
where
    R: ProductReadModelStore,
    P: PositionStore,
{
    type Event = ProductEvent;

    fn name(&self) -> &'static str {
        PRODUCT_CATALOG
    }

    async fn handle(&self, event: &StoredEvent<ProductEvent>) -> Result<Handled> {
        self.process_event_at(&event.event, event.event_id, event.timestamp, event.sequence)
            .await
    }

    async fn position(&self) -> Result<ProjectionPosition> {
        self.projection_position().await
    }

    async fn reset(&self) -> Result<()> {
        ProductCatalogProjector::reset(self).await
    }
}
