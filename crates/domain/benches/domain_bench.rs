use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    ActivateProduct, Aggregate, ChangePrice, CreateProduct, DomainEvent, Product, ProductEvent,
    ProductService,
};
use event_store::{
    AppendOptions, EventEnvelope, EventStore, InMemoryEventStore, StoredEvent, Version,
};

fn make_envelope(event: &ProductEvent) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(event.product_id())
        .aggregate_type("Product")
        .event_type(event.event_type())
        .schema_version(event.schema_version())
        .version(DomainEvent::version(event))
        .timestamp(event.occurred_at())
        .payload(event.to_payload().unwrap())
        .build()
        .unwrap()
}

/// A product history of one creation followed by `changes` price changes.
fn price_history(changes: i64) -> Vec<ProductEvent> {
    let (mut product, mut events) = Product::create("SKU-BENCH", "Bench", "", 1000)
        .unwrap()
        .into_parts();
    for i in 0..changes {
        let (next, produced) = product
            .change_price(1000 + (i % 2) * 10 + 1, product.version(), false)
            .unwrap()
            .into_parts();
        product = next;
        events.extend(produced);
    }
    events
}

fn bench_create_product(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/create_product", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = ProductService::new(InMemoryEventStore::new());
                let cmd = CreateProduct::new("SKU-001", "Widget", "", 1000);
                service.create_product(cmd).await.unwrap();
            });
        });
    });
}

fn bench_full_command_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/create_activate_reprice", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = ProductService::new(InMemoryEventStore::new());
                let cmd = CreateProduct::new("SKU-001", "Widget", "", 1000);
                let id = cmd.product_id;
                service.create_product(cmd).await.unwrap();
                service
                    .activate_product(ActivateProduct::new(id, Version::first()))
                    .await
                    .unwrap();
                service
                    .change_price(ChangePrice::new(id, 1100, Version::new(2)))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_reconstitute_in_memory(c: &mut Criterion) {
    let history = price_history(99);

    c.bench_function("domain/reconstitute_100_events", |b| {
        b.iter(|| Product::reconstitute(history.clone()).unwrap());
    });
}

fn bench_load_from_store(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let history = price_history(99);
    let id: AggregateId = history[0].product_id();

    rt.block_on(async {
        let envelopes = history.iter().map(make_envelope).collect();
        store
            .append(envelopes, AppendOptions::expect_new())
            .await
            .unwrap();
    });

    c.bench_function("domain/decode_and_reconstitute_100_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let envelopes = store.get_events_for_aggregate(id).await.unwrap();
                let events = envelopes
                    .iter()
                    .map(|e| StoredEvent::<ProductEvent>::decode(e).unwrap().event);
                Product::reconstitute(events).unwrap()
            })
        });
    });
}

criterion_group!(
    benches,
    bench_create_product,
    bench_full_command_cycle,
    bench_reconstitute_in_memory,
    bench_load_from_store,
);
criterion_main!(benches);
