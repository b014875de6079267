//! Product commands.

use common::AggregateId;
use event_store::Version;

use crate::command::Command;

use super::Product;

/// Command to create a new product.
#[derive(Debug, Clone)]
pub struct CreateProduct {
    pub product_id: AggregateId,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
}

impl CreateProduct {
    /// Creates a command with a generated product id.
    pub fn new(
        sku: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        price_cents: i64,
    ) -> Self {
        Self {
            product_id: AggregateId::new(),
            sku: sku.into(),
            name: name.into(),
            description: description.into(),
            price_cents,
        }
    }

    pub fn with_id(mut self, product_id: AggregateId) -> Self {
        self.product_id = product_id;
        self
    }
}

impl Command for CreateProduct {
    type Aggregate = Product;

    fn aggregate_id(&self) -> AggregateId {
        self.product_id
    }
}

/// Command to change a product's name and description.
#[derive(Debug, Clone)]
pub struct UpdateProduct {
    pub product_id: AggregateId,
    pub name: String,
    pub description: String,
    pub expected_version: Version,
}

impl UpdateProduct {
    pub fn new(
        product_id: AggregateId,
        name: impl Into<String>,
        description: impl Into<String>,
        expected_version: Version,
    ) -> Self {
        Self {
            product_id,
            name: name.into(),
            description: description.into(),
            expected_version,
        }
    }
}

impl Command for UpdateProduct {
    type Aggregate = Product;

    fn aggregate_id(&self) -> AggregateId {
        self.product_id
    }
}

/// Command to change a product's price.
#[derive(Debug, Clone)]
pub struct ChangePrice {
    pub product_id: AggregateId,
    pub new_price_cents: i64,
    pub expected_version: Version,
    /// Confirms a change above the large-change threshold.
    pub confirm_large_change: bool,
}

impl ChangePrice {
    pub fn new(product_id: AggregateId, new_price_cents: i64, expected_version: Version) -> Self {
        Self {
            product_id,
            new_price_cents,
            expected_version,
            confirm_large_change: false,
        }
    }

    pub fn confirmed(mut self) -> Self {
        self.confirm_large_change = true;
        self
    }
}

impl Command for ChangePrice {
    type Aggregate = Product;

    fn aggregate_id(&self) -> AggregateId {
        self.product_id
    }
}

/// Command to make a draft product available for sale.
#[derive(Debug, Clone)]
pub struct ActivateProduct {
    pub product_id: AggregateId,
    pub expected_version: Version,
}

impl ActivateProduct {
    pub fn new(product_id: AggregateId, expected_version: Version) -> Self {
        Self {
            product_id,
            expected_version,
        }
    }
}

impl Command for ActivateProduct {
    type Aggregate = Product;

    fn aggregate_id(&self) -> AggregateId {
        self.product_id
    }
}

/// Command to withdraw a product from sale.
#[derive(Debug, Clone)]
pub struct DiscontinueProduct {
    pub product_id: AggregateId,
    pub expected_version: Version,
    pub reason: Option<String>,
}

impl DiscontinueProduct {
    pub fn new(product_id: AggregateId, expected_version: Version) -> Self {
        Self {
            product_id,
            expected_version,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl Command for DiscontinueProduct {
    type Aggregate = Product;

    fn aggregate_id(&self) -> AggregateId {
        self.product_id
    }
}

/// Command to delete a product.
#[derive(Debug, Clone)]
pub struct DeleteProduct {
    pub product_id: AggregateId,
    pub expected_version: Version,
    pub deleted_by: Option<String>,
}

impl DeleteProduct {
    pub fn new(product_id: AggregateId, expected_version: Version) -> Self {
        Self {
            product_id,
            expected_version,
            deleted_by: None,
        }
    }

    pub fn by(mut self, deleted_by: impl Into<String>) -> Self {
        self.deleted_by = Some(deleted_by.into());
        self
    }
}

impl Command for DeleteProduct {
    type Aggregate = Product;

    fn aggregate_id(&self) -> AggregateId {
        self.product_id
    }
}
