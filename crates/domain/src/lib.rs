//! Domain layer for the product catalog.
//!
//! This crate provides:
//! - `Aggregate` and `DomainEvent` traits and the `Outcome` of a command
//! - `Command` and `CommandHandler` for loading, deciding and appending
//! - the `Product` aggregate, its events, payload schemas and `ProductService`

pub mod aggregate;
pub mod command;
pub mod error;
pub mod product;

pub use aggregate::{Aggregate, DomainEvent, Outcome};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
pub use product::{
    ActivateProduct, ChangePrice, CreateProduct, DeleteProduct, DiscontinueProduct,
    LARGE_PRICE_CHANGE_THRESHOLD, Money, Product, ProductError, ProductEvent, ProductService,
    ProductStatus, Sku, UpdateProduct,
};
