//! Projection worker for the product catalog.
//!
//! Runs the [`ProjectionProcessor`] against the event store and serves a
//! small read-only HTTP surface: health, Prometheus metrics, projection
//! position and lag, and product read-model lookups.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{
    InMemoryPositionStore, InMemoryProductReadModelStore, ProcessorConfig,
    ProductCatalogProjector, ProjectionProcessor,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// The catalog projector as wired by the worker.
pub type CatalogProjector =
    ProductCatalogProjector<InMemoryProductReadModelStore, InMemoryPositionStore>;

/// Processor driving the catalog projector from store `S`.
pub type CatalogProcessor<S> = ProjectionProcessor<S, CatalogProjector>;

/// Shared state handed to the route handlers.
pub struct AppState<S: EventStore> {
    pub processor: Arc<CatalogProcessor<S>>,
}

impl<S: EventStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            processor: self.processor.clone(),
        }
    }
}

/// Builds the processor and state over `event_store`.
pub fn create_state<S: EventStore>(event_store: S, config: ProcessorConfig) -> AppState<S> {
    let projector = ProductCatalogProjector::new(
        InMemoryProductReadModelStore::new(),
        InMemoryPositionStore::new(),
    );

    AppState {
        processor: Arc::new(ProjectionProcessor::with_config(
            event_store,
            projector,
            config,
        )),
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + 'static>(
    state: AppState<S>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/projections/product-catalog",
            get(routes::projections::product_catalog::<S>),
        )
        .route("/products", get(routes::products::list::<S>))
        .route("/products/{id}", get(routes::products::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
