//! Read models and projections for the CQRS query side.
//!
//! This crate provides the query side of the CQRS pattern:
//! - [`Projection`] trait for folding stored events into read models
//! - [`ProductCatalogProjector`] maintaining [`ProductReadModel`] records
//! - [`ProductReadModelStore`] and [`PositionStore`] seams with in-memory
//!   implementations
//! - [`ProjectionProcessor`] for feeding events from the store to a projection

pub mod error;
pub mod processor;
pub mod product_catalog;
pub mod projection;
pub mod read_model;
pub mod store;

pub use error::{ProjectionError, Result};
pub use processor::{ProcessorConfig, ProjectionLag, ProjectionProcessor};
pub use product_catalog::{PRODUCT_CATALOG, ProductCatalogProjector};
pub use projection::{Handled, Projection, ProjectionPosition};
pub use read_model::ProductReadModel;
pub use store::{
    InMemoryPositionStore, InMemoryProductReadModelStore, PositionStore, ProductReadModelStore,
};
