//! Product domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{Money, Sku};

pub const PRODUCT_CREATED: &str = "ProductCreated";
pub const PRODUCT_UPDATED: &str = "ProductUpdated";
pub const PRODUCT_PRICE_CHANGED: &str = "ProductPriceChanged";
pub const PRODUCT_ACTIVATED: &str = "ProductActivated";
pub const PRODUCT_DISCONTINUED: &str = "ProductDiscontinued";
pub const PRODUCT_DELETED: &str = "ProductDeleted";

/// Events that can occur on a product aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProductEvent {
    /// Product was created in draft status.
    ProductCreated(ProductCreatedData),

    /// Name and/or description changed.
    ProductUpdated(ProductUpdatedData),

    /// Price changed.
    ProductPriceChanged(ProductPriceChangedData),

    /// Product was made available for sale.
    ProductActivated(ProductActivatedData),

    /// Product was withdrawn from sale.
    ProductDiscontinued(ProductDiscontinuedData),

    /// Product was deleted (tombstoned).
    ProductDeleted(ProductDeletedData),
}

impl ProductEvent {
    pub fn product_id(&self) -> AggregateId {
        match self {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::ProductUpdated(e) => e.product_id,
            ProductEvent::ProductPriceChanged(e) => e.product_id,
            ProductEvent::ProductActivated(e) => e.product_id,
            ProductEvent::ProductDiscontinued(e) => e.product_id,
            ProductEvent::ProductDeleted(e) => e.product_id,
        }
    }

    pub fn version(&self) -> Version {
        match self {
            ProductEvent::ProductCreated(e) => e.version,
            ProductEvent::ProductUpdated(e) => e.version,
            ProductEvent::ProductPriceChanged(e) => e.version,
            ProductEvent::ProductActivated(e) => e.version,
            ProductEvent::ProductDiscontinued(e) => e.version,
            ProductEvent::ProductDeleted(e) => e.version,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductUpdated(e) => e.occurred_at,
            ProductEvent::ProductPriceChanged(e) => e.occurred_at,
            ProductEvent::ProductActivated(e) => e.occurred_at,
            ProductEvent::ProductDiscontinued(e) => e.occurred_at,
            ProductEvent::ProductDeleted(e) => e.occurred_at,
        }
    }
}

impl DomainEvent for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => PRODUCT_CREATED,
            ProductEvent::ProductUpdated(_) => PRODUCT_UPDATED,
            ProductEvent::ProductPriceChanged(_) => PRODUCT_PRICE_CHANGED,
            ProductEvent::ProductActivated(_) => PRODUCT_ACTIVATED,
            ProductEvent::ProductDiscontinued(_) => PRODUCT_DISCONTINUED,
            ProductEvent::ProductDeleted(_) => PRODUCT_DELETED,
        }
    }

    /// Created and PriceChanged are on their second payload schema.
    fn schema_version(&self) -> i32 {
        match self {
            ProductEvent::ProductCreated(_) | ProductEvent::ProductPriceChanged(_) => 2,
            ProductEvent::ProductUpdated(_)
            | ProductEvent::ProductActivated(_)
            | ProductEvent::ProductDiscontinued(_)
            | ProductEvent::ProductDeleted(_) => 1,
        }
    }

    fn aggregate_id(&self) -> AggregateId {
        self.product_id()
    }

    fn version(&self) -> Version {
        ProductEvent::version(self)
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        ProductEvent::occurred_at(self)
    }

    fn to_payload(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            ProductEvent::ProductCreated(e) => serde_json::to_value(e),
            ProductEvent::ProductUpdated(e) => serde_json::to_value(e),
            ProductEvent::ProductPriceChanged(e) => serde_json::to_value(e),
            ProductEvent::ProductActivated(e) => serde_json::to_value(e),
            ProductEvent::ProductDiscontinued(e) => serde_json::to_value(e),
            ProductEvent::ProductDeleted(e) => serde_json::to_value(e),
        }
    }
}

/// Data for ProductCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCreatedData {
    pub product_id: AggregateId,
    pub version: Version,
    pub sku: Sku,
    pub name: String,
    pub description: String,
    #[serde(rename = "price_cents")]
    pub price: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Data for ProductUpdated event.
///
/// Carries the previous values so consumers can render a change without
/// looking anything up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductUpdatedData {
    pub product_id: AggregateId,
    pub version: Version,
    pub name: String,
    pub description: String,
    pub previous_name: String,
    pub previous_description: String,
    pub occurred_at: DateTime<Utc>,
}

/// Data for ProductPriceChanged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPriceChangedData {
    pub product_id: AggregateId,
    pub version: Version,
    #[serde(rename = "previous_price_cents")]
    pub previous_price: Money,
    #[serde(rename = "new_price_cents")]
    pub new_price: Money,
    /// `(new - previous) / previous * 100`.
    pub percentage_change: f64,
    /// Whether a change above the threshold was explicitly confirmed.
    pub confirmed: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Data for ProductActivated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductActivatedData {
    pub product_id: AggregateId,
    pub version: Version,
    pub occurred_at: DateTime<Utc>,
}

/// Data for ProductDiscontinued event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDiscontinuedData {
    pub product_id: AggregateId,
    pub version: Version,
    #[serde(default)]
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Data for ProductDeleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDeletedData {
    pub product_id: AggregateId,
    pub version: Version,
    #[serde(default)]
    pub deleted_by: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activated() -> ProductEvent {
        ProductEvent::ProductActivated(ProductActivatedData {
            product_id: AggregateId::new(),
            version: Version::new(2),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn common_fields_are_reachable_for_every_variant() {
        let event = activated();
        assert_eq!(event.event_type(), "ProductActivated");
        assert_eq!(event.schema_version(), 1);
        assert_eq!(ProductEvent::version(&event), Version::new(2));
        assert_eq!(DomainEvent::aggregate_id(&event), event.product_id());
    }

    #[test]
    fn payload_omits_type_tag() {
        let event = activated();
        let payload = event.to_payload().unwrap();
        assert!(payload.get("type").is_none());
        assert_eq!(payload["version"], 2);
        assert!(payload.get("product_id").is_some());
    }

    #[test]
    fn created_payload_uses_cent_keys() {
        let event = ProductEvent::ProductCreated(ProductCreatedData {
            product_id: AggregateId::new(),
            version: Version::first(),
            sku: Sku::parse("SKU-1").unwrap(),
            name: "Widget".into(),
            description: String::new(),
            price: Money::from_cents(1999),
            occurred_at: Utc::now(),
        });
        let payload = event.to_payload().unwrap();
        assert_eq!(payload["price_cents"], 1999);
        assert_eq!(payload["sku"], "SKU-1");
        assert_eq!(event.schema_version(), 2);
    }
}
