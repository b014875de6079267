//! Product aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod schema;
mod service;
mod state;
mod value_objects;

pub use aggregate::{LARGE_PRICE_CHANGE_THRESHOLD, Product};
pub use commands::*;
pub use events::{
    PRODUCT_ACTIVATED, PRODUCT_CREATED, PRODUCT_DELETED, PRODUCT_DISCONTINUED,
    PRODUCT_PRICE_CHANGED, PRODUCT_UPDATED, ProductActivatedData, ProductCreatedData,
    ProductDeletedData, ProductDiscontinuedData, ProductEvent, ProductPriceChangedData,
    ProductUpdatedData,
};
pub use service::ProductService;
pub use state::ProductStatus;
pub use value_objects::{
    DESCRIPTION_MAX_LENGTH, Money, NAME_MAX_LENGTH, SKU_MAX_LENGTH, SKU_MIN_LENGTH, Sku,
    validate_description, validate_name,
};

use common::AggregateId;
use event_store::Version;
use thiserror::Error;

/// Errors that can occur during product operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProductError {
    /// A business rule was broken by the command's input.
    #[error("Invariant violation ({rule}): {message}")]
    InvariantViolation { rule: &'static str, message: String },

    /// The caller's view of the product is stale.
    #[error("Concurrency conflict: expected version {expected}, actual {actual}")]
    ConcurrencyConflict { expected: Version, actual: Version },

    #[error("Invalid state transition: cannot {action} from {current_status} status")]
    InvalidStateTransition {
        current_status: ProductStatus,
        action: &'static str,
    },

    /// A price change above the threshold needs explicit confirmation.
    #[error(
        "Price change from {current_price} to {new_price} ({percentage_change:.2}%) exceeds {threshold}% and must be confirmed"
    )]
    PriceChangeThresholdExceeded {
        current_price: Money,
        new_price: Money,
        percentage_change: f64,
        threshold: f64,
    },

    /// The product was deleted; no further commands are accepted.
    #[error("Product {product_id} has been deleted")]
    DomainGone { product_id: AggregateId },

    /// The event history cannot be folded into a product.
    #[error("Illegal state: {0}")]
    IllegalState(String),
}

impl ProductError {
    pub(crate) fn invariant(rule: &'static str, message: impl Into<String>) -> Self {
        ProductError::InvariantViolation {
            rule,
            message: message.into(),
        }
    }

    /// Returns true if reloading and retrying the command may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProductError::ConcurrencyConflict { .. })
    }
}
