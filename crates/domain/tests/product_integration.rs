//! Integration tests for the Product aggregate.
//!
//! These tests cover the full product lifecycle through `ProductService`,
//! reconstruction from stored (including legacy) events, and concurrency
//! handling at both the aggregate and the store.

use common::AggregateId;
use domain::{
    ActivateProduct, Aggregate, ChangePrice, CreateProduct, DeleteProduct, DiscontinueProduct,
    DomainError, DomainEvent, Money, Product, ProductError, ProductEvent, ProductService,
    ProductStatus, UpdateProduct,
};
use event_store::{
    AppendOptions, EventEnvelope, EventStore, EventStoreError, InMemoryEventStore, Version,
};

/// Helper to create a test product service
fn create_service() -> ProductService<InMemoryEventStore> {
    ProductService::new(InMemoryEventStore::new())
}

async fn create_product(service: &ProductService<InMemoryEventStore>) -> AggregateId {
    let cmd = CreateProduct::new("SKU-001", "Widget", "A small widget", 1000);
    let id = cmd.product_id;
    service.create_product(cmd).await.unwrap();
    id
}

mod product_lifecycle {
    use super::*;

    #[tokio::test]
    async fn complete_product_lifecycle() {
        let service = create_service();

        let cmd = CreateProduct::new("SKU-001", "Widget", "A small widget", 1000);
        let id = cmd.product_id;
        let result = service.create_product(cmd).await.unwrap();
        assert_eq!(result.aggregate.status(), ProductStatus::Draft);
        assert_eq!(result.new_version, Version::first());

        let result = service
            .update_product(UpdateProduct::new(id, "Widget Pro", "Better", Version::first()))
            .await
            .unwrap();
        assert_eq!(result.aggregate.name(), "Widget Pro");
        assert_eq!(result.new_version, Version::new(2));

        let result = service
            .activate_product(ActivateProduct::new(id, Version::new(2)))
            .await
            .unwrap();
        assert_eq!(result.aggregate.status(), ProductStatus::Active);

        let result = service
            .change_price(ChangePrice::new(id, 1100, Version::new(3)))
            .await
            .unwrap();
        assert_eq!(result.aggregate.price(), Money::from_cents(1100));

        let result = service
            .discontinue_product(
                DiscontinueProduct::new(id, Version::new(4)).with_reason("superseded"),
            )
            .await
            .unwrap();
        assert_eq!(result.aggregate.status(), ProductStatus::Discontinued);

        let result = service
            .delete_product(DeleteProduct::new(id, Version::new(5)).by("admin"))
            .await
            .unwrap();
        assert!(result.aggregate.is_deleted());
        assert_eq!(result.new_version, Version::new(6));

        let events = service
            .handler()
            .store()
            .get_events_for_aggregate(id)
            .await
            .unwrap();
        let types: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(
            types,
            [
                "ProductCreated",
                "ProductUpdated",
                "ProductActivated",
                "ProductPriceChanged",
                "ProductDiscontinued",
                "ProductDeleted",
            ]
        );
    }

    #[tokio::test]
    async fn get_product_reflects_stored_state() {
        let service = create_service();
        assert!(service.get_product(AggregateId::new()).await.unwrap().is_none());

        let id = create_product(&service).await;
        service
            .activate_product(ActivateProduct::new(id, Version::first()))
            .await
            .unwrap();

        let product = service.get_product(id).await.unwrap().unwrap();
        assert_eq!(product.id(), id);
        assert_eq!(product.version(), Version::new(2));
        assert_eq!(product.status(), ProductStatus::Active);
    }

    #[tokio::test]
    async fn large_price_change_needs_confirmation() {
        let service = create_service();
        let id = create_product(&service).await;
        service
            .activate_product(ActivateProduct::new(id, Version::first()))
            .await
            .unwrap();

        let err = service
            .change_price(ChangePrice::new(id, 2000, Version::new(2)))
            .await
            .unwrap_err();
        match err {
            DomainError::Product(ProductError::PriceChangeThresholdExceeded {
                percentage_change,
                threshold,
                ..
            }) => {
                assert_eq!(percentage_change, 100.0);
                assert_eq!(threshold, 20.0);
            }
            other => panic!("unexpected error {other:?}"),
        }

        let result = service
            .change_price(ChangePrice::new(id, 2000, Version::new(2)).confirmed())
            .await
            .unwrap();
        assert_eq!(result.aggregate.price(), Money::from_cents(2000));
        match &result.events[0] {
            ProductEvent::ProductPriceChanged(data) => assert!(data.confirmed),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn just_over_threshold_needs_confirmation() {
        let store = InMemoryEventStore::new();
        let service = ProductService::new(store.clone());
        let id = create_product(&service).await;
        service
            .activate_product(ActivateProduct::new(id, Version::first()))
            .await
            .unwrap();

        // 1000 -> 1201 cents is +20.1%.
        let err = service
            .change_price(ChangePrice::new(id, 1201, Version::new(2)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Product(ProductError::PriceChangeThresholdExceeded { .. })
        ));
        assert_eq!(store.get_events_for_aggregate(id).await.unwrap().len(), 2);

        let result = service
            .change_price(ChangePrice::new(id, 1201, Version::new(2)).confirmed())
            .await
            .unwrap();
        assert_eq!(result.aggregate.price().cents(), 1201);
        assert_eq!(result.new_version, Version::new(3));

        let stored = service.get_product(id).await.unwrap().unwrap();
        assert_eq!(stored.price().cents(), 1201);
        assert_eq!(stored.version(), Version::new(3));
    }

    #[tokio::test]
    async fn unchanged_update_appends_nothing() {
        let store = InMemoryEventStore::new();
        let service = ProductService::new(store.clone());
        let id = create_product(&service).await;

        let result = service
            .update_product(UpdateProduct::new(
                id,
                "Widget",
                "A small widget",
                Version::first(),
            ))
            .await
            .unwrap();
        assert!(result.events.is_empty());
        assert_eq!(store.event_count().await, 1);
    }
}

mod reconstruction {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[tokio::test]
    async fn aggregate_reconstruction_from_events() {
        let service = create_service();
        let id = create_product(&service).await;
        service
            .activate_product(ActivateProduct::new(id, Version::first()))
            .await
            .unwrap();
        service
            .change_price(ChangePrice::new(id, 900, Version::new(2)))
            .await
            .unwrap();

        let store = service.handler().store();
        let envelopes = store.get_events_for_aggregate(id).await.unwrap();
        let events: Vec<ProductEvent> = envelopes
            .iter()
            .map(|e| {
                event_store::StoredEvent::<ProductEvent>::decode(e)
                    .unwrap()
                    .event
            })
            .collect();

        let product = Product::reconstitute(events).unwrap();
        assert_eq!(product.version(), Version::new(3));
        assert_eq!(product.price(), Money::from_cents(900));
        assert_eq!(product, service.get_product(id).await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn legacy_events_are_upcast_on_load() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        let at = Utc.with_ymd_and_hms(2023, 1, 10, 9, 0, 0).unwrap();

        let created = EventEnvelope::builder()
            .aggregate_id(id)
            .aggregate_type("Product")
            .event_type("ProductCreated")
            .schema_version(1)
            .version(Version::first())
            .timestamp(at)
            .payload(json!({
                "product_id": id,
                "version": 1,
                "sku": "LEGACY-1",
                "name": "Old lamp",
                "price_cents": 4000,
                "created_at": at,
            }))
            .build()
            .unwrap();
        let repriced = EventEnvelope::builder()
            .aggregate_id(id)
            .aggregate_type("Product")
            .event_type("ProductPriceChanged")
            .schema_version(1)
            .version(Version::new(2))
            .timestamp(at)
            .payload(json!({
                "product_id": id,
                "version": 2,
                "old_price": 4000,
                "new_price": 3000,
                "occurred_at": at,
            }))
            .build()
            .unwrap();
        store
            .append(vec![created, repriced], AppendOptions::expect_new())
            .await
            .unwrap();

        let service = ProductService::new(store);
        let product = service.get_product(id).await.unwrap().unwrap();
        assert_eq!(product.description(), "");
        assert_eq!(product.price(), Money::from_cents(3000));
        assert_eq!(product.created_at(), at);

        // New events are written with the current schema.
        let result = service
            .update_product(UpdateProduct::new(id, "Old lamp", "Brass", Version::new(2)))
            .await
            .unwrap();
        assert_eq!(result.events[0].schema_version(), 1);
        assert_eq!(result.new_version, Version::new(3));
    }

    #[tokio::test]
    async fn unknown_schema_fails_the_load() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        let envelope = EventEnvelope::builder()
            .aggregate_id(id)
            .aggregate_type("Product")
            .event_type("ProductCreated")
            .schema_version(9)
            .version(Version::first())
            .payload(json!({}))
            .build()
            .unwrap();
        store
            .append(vec![envelope], AppendOptions::expect_new())
            .await
            .unwrap();

        let err = ProductService::new(store).get_product(id).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::EventStore(EventStoreError::UnknownEventSchema { .. })
        ));
    }
}

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn stale_expected_version_is_rejected() {
        let service = create_service();
        let id = create_product(&service).await;

        service
            .update_product(UpdateProduct::new(id, "First", "", Version::first()))
            .await
            .unwrap();

        // Second writer still believes the product is at version 1.
        let err = service
            .update_product(UpdateProduct::new(id, "Second", "", Version::first()))
            .await
            .unwrap_err();
        assert!(err.is_concurrency_conflict());
        assert!(matches!(
            err,
            DomainError::Product(ProductError::ConcurrencyConflict { .. })
        ));

        let product = service.get_product(id).await.unwrap().unwrap();
        assert_eq!(product.name(), "First");
    }

    #[tokio::test]
    async fn store_rejects_duplicate_stream_version() {
        let store = InMemoryEventStore::new();
        let service = ProductService::new(store.clone());
        let id = create_product(&service).await;

        // Both writers decide against version 1.
        let loaded = service.get_product(id).await.unwrap().unwrap();
        let (_, first) = loaded.activate(Version::first()).unwrap().into_parts();
        let (_, second) = loaded
            .discontinue(Version::first(), None)
            .unwrap()
            .into_parts();

        let to_envelope = |event: &ProductEvent| {
            EventEnvelope::builder()
                .aggregate_id(id)
                .aggregate_type("Product")
                .event_type(event.event_type())
                .schema_version(event.schema_version())
                .version(DomainEvent::version(event))
                .payload(event.to_payload().unwrap())
                .build()
                .unwrap()
        };

        store
            .append(
                vec![to_envelope(&first[0])],
                AppendOptions::expect_version(Version::first()),
            )
            .await
            .unwrap();
        let result = store
            .append(
                vec![to_envelope(&second[0])],
                AppendOptions::expect_version(Version::first()),
            )
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
        let product = service.get_product(id).await.unwrap().unwrap();
        assert_eq!(product.status(), ProductStatus::Active);
    }

    #[tokio::test]
    async fn retry_after_reload_succeeds() {
        let service = create_service();
        let id = create_product(&service).await;

        service
            .activate_product(ActivateProduct::new(id, Version::first()))
            .await
            .unwrap();

        let err = service
            .change_price(ChangePrice::new(id, 1100, Version::first()))
            .await
            .unwrap_err();
        assert!(err.is_concurrency_conflict());

        let current = service.get_product(id).await.unwrap().unwrap();
        let result = service
            .change_price(ChangePrice::new(id, 1100, current.version()))
            .await
            .unwrap();
        assert_eq!(result.new_version, Version::new(3));
    }
}

mod error_handling {
    use super::*;

    #[tokio::test]
    async fn invalid_creation_persists_nothing() {
        let store = InMemoryEventStore::new();
        let service = ProductService::new(store.clone());

        let err = service
            .create_product(CreateProduct::new("S", "Widget", "", 100))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Product(ProductError::InvariantViolation {
                rule: "sku_length",
                ..
            })
        ));
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn commands_on_missing_product_fail() {
        let service = create_service();
        let err = service
            .activate_product(ActivateProduct::new(AggregateId::new(), Version::first()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::AggregateNotFound { .. }));
    }

    #[tokio::test]
    async fn cannot_activate_twice() {
        let service = create_service();
        let id = create_product(&service).await;
        service
            .activate_product(ActivateProduct::new(id, Version::first()))
            .await
            .unwrap();

        let err = service
            .activate_product(ActivateProduct::new(id, Version::new(2)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Product(ProductError::InvalidStateTransition {
                current_status: ProductStatus::Active,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn deleted_product_is_gone() {
        let service = create_service();
        let id = create_product(&service).await;
        service
            .delete_product(DeleteProduct::new(id, Version::first()))
            .await
            .unwrap();

        let err = service
            .update_product(UpdateProduct::new(id, "Back", "", Version::new(2)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Product(ProductError::DomainGone { .. })
        ));
    }
}
