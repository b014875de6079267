//! Product catalog read model record.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::product::ProductCreatedData;
use domain::{Money, ProductStatus};
use event_store::{EventId, Version};
use serde::{Deserialize, Serialize};

/// Current state of one product as served to queries.
///
/// `aggregate_version` and `last_event_id` record the newest event folded
/// into the record; handlers only apply events with a higher version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductReadModel {
    pub product_id: AggregateId,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    /// Formatted price, e.g. `"$12.34"`.
    pub price_display: String,
    pub status: ProductStatus,
    /// Active and not deleted.
    pub is_available: bool,
    pub discontinue_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub aggregate_version: Version,
    pub last_event_id: EventId,
}

impl ProductReadModel {
    pub fn from_created(data: &ProductCreatedData, event_id: EventId) -> Self {
        let mut record = Self {
            product_id: data.product_id,
            sku: data.sku.to_string(),
            name: data.name.clone(),
            description: data.description.clone(),
            price_cents: data.price.cents(),
            price_display: String::new(),
            status: ProductStatus::Draft,
            is_available: false,
            discontinue_reason: None,
            created_at: data.occurred_at,
            updated_at: data.occurred_at,
            deleted_at: None,
            aggregate_version: data.version,
            last_event_id: event_id,
        };
        record.refresh_derived();
        record
    }

    /// Recomputes the display fields from the stored ones.
    pub fn refresh_derived(&mut self) {
        self.price_display = Money::from_cents(self.price_cents).to_string();
        self.is_available = self.status == ProductStatus::Active && self.deleted_at.is_none();
    }

    /// Returns true if an event at `version` is newer than this record.
    pub fn accepts(&self, version: Version) -> bool {
        self.aggregate_version < version
    }
}
