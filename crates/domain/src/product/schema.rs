//! Payload schemas for stored product events.
//!
//! | event type            | versions | notes                                   |
//! |-----------------------|----------|-----------------------------------------|
//! | `ProductCreated`      | 1, 2     | v1: no description, `created_at` key    |
//! | `ProductUpdated`      | 1        |                                         |
//! | `ProductPriceChanged` | 1, 2     | v1: `old_price`/`new_price`, no percent |
//! | `ProductActivated`    | 1        |                                         |
//! | `ProductDiscontinued` | 1        |                                         |
//! | `ProductDeleted`      | 1        |                                         |

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{SchemaRegistry, Version, VersionedEvent};
use serde::Deserialize;

use super::events::*;
use super::{Money, Sku};

static PRODUCT_SCHEMAS: LazyLock<SchemaRegistry<ProductEvent>> = LazyLock::new(|| {
    SchemaRegistry::new()
        .register(PRODUCT_CREATED, 1, upcast_created_v1)
        .register(PRODUCT_CREATED, 2, |payload| {
            serde_json::from_value(payload).map(ProductEvent::ProductCreated)
        })
        .register(PRODUCT_UPDATED, 1, |payload| {
            serde_json::from_value(payload).map(ProductEvent::ProductUpdated)
        })
        .register(PRODUCT_PRICE_CHANGED, 1, upcast_price_changed_v1)
        .register(PRODUCT_PRICE_CHANGED, 2, |payload| {
            serde_json::from_value(payload).map(ProductEvent::ProductPriceChanged)
        })
        .register(PRODUCT_ACTIVATED, 1, |payload| {
            serde_json::from_value(payload).map(ProductEvent::ProductActivated)
        })
        .register(PRODUCT_DISCONTINUED, 1, |payload| {
            serde_json::from_value(payload).map(ProductEvent::ProductDiscontinued)
        })
        .register(PRODUCT_DELETED, 1, |payload| {
            serde_json::from_value(payload).map(ProductEvent::ProductDeleted)
        })
});

impl VersionedEvent for ProductEvent {
    fn schema_registry() -> &'static SchemaRegistry<Self> {
        &PRODUCT_SCHEMAS
    }
}

#[derive(Deserialize)]
struct ProductCreatedV1 {
    product_id: AggregateId,
    version: Version,
    sku: Sku,
    name: String,
    price_cents: Money,
    created_at: DateTime<Utc>,
}

fn upcast_created_v1(payload: serde_json::Value) -> serde_json::Result<ProductEvent> {
    let v1: ProductCreatedV1 = serde_json::from_value(payload)?;
    Ok(ProductEvent::ProductCreated(ProductCreatedData {
        product_id: v1.product_id,
        version: v1.version,
        sku: v1.sku,
        name: v1.name,
        description: String::new(),
        price: v1.price_cents,
        occurred_at: v1.created_at,
    }))
}

#[derive(Deserialize)]
struct ProductPriceChangedV1 {
    product_id: AggregateId,
    version: Version,
    old_price: Money,
    new_price: Money,
    occurred_at: DateTime<Utc>,
}

fn upcast_price_changed_v1(payload: serde_json::Value) -> serde_json::Result<ProductEvent> {
    let v1: ProductPriceChangedV1 = serde_json::from_value(payload)?;
    Ok(ProductEvent::ProductPriceChanged(ProductPriceChangedData {
        product_id: v1.product_id,
        version: v1.version,
        previous_price: v1.old_price,
        new_price: v1.new_price,
        percentage_change: v1.old_price.percentage_change_to(v1.new_price),
        confirmed: false,
        occurred_at: v1.occurred_at,
    }))
}
