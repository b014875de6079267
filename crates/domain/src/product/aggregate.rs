//! Product aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, DomainEvent, Outcome};

use super::{
    Money, ProductError, ProductEvent, ProductStatus, Sku,
    events::{
        ProductActivatedData, ProductCreatedData, ProductDeletedData, ProductDiscontinuedData,
        ProductPriceChangedData, ProductUpdatedData,
    },
    validate_description, validate_name,
};

/// Price changes above this percentage (either direction) on an active
/// product must be confirmed.
pub const LARGE_PRICE_CHANGE_THRESHOLD: f64 = 20.0;

/// Product aggregate root.
///
/// Commands are `&self` methods that validate their input against the current
/// state and return an [`Outcome`] with the next state and the produced
/// events. The receiver is never modified, so a rejected command leaves the
/// caller's copy exactly as it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    id: AggregateId,
    version: Version,
    sku: Sku,
    name: String,
    description: String,
    price: Money,
    status: ProductStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl Aggregate for Product {
    type Event = ProductEvent;
    type Error = ProductError;

    fn aggregate_type() -> &'static str {
        "Product"
    }

    fn id(&self) -> AggregateId {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            ProductEvent::ProductCreated(data) => *self = Self::from_created(data),
            ProductEvent::ProductUpdated(data) => {
                self.name = data.name;
                self.description = data.description;
                self.touch(data.version, data.occurred_at);
            }
            ProductEvent::ProductPriceChanged(data) => {
                self.price = data.new_price;
                self.touch(data.version, data.occurred_at);
            }
            ProductEvent::ProductActivated(data) => {
                self.status = ProductStatus::Active;
                self.touch(data.version, data.occurred_at);
            }
            ProductEvent::ProductDiscontinued(data) => {
                self.status = ProductStatus::Discontinued;
                self.touch(data.version, data.occurred_at);
            }
            ProductEvent::ProductDeleted(data) => {
                self.deleted_at = Some(data.occurred_at);
                self.touch(data.version, data.occurred_at);
            }
        }
    }

    /// Rebuilds a product from its history.
    ///
    /// The first event must be `ProductCreated`; every later event must belong
    /// to the same product and carry the next version.
    fn reconstitute(events: impl IntoIterator<Item = Self::Event>) -> Result<Self, Self::Error> {
        let mut events = events.into_iter();

        let mut product = match events.next() {
            Some(ProductEvent::ProductCreated(data)) => Self::from_created(data),
            Some(other) => {
                return Err(ProductError::IllegalState(format!(
                    "history must start with ProductCreated, found {} at version {}",
                    other.event_type(),
                    other.version()
                )));
            }
            None => {
                return Err(ProductError::IllegalState(
                    "cannot reconstitute a product from an empty history".into(),
                ));
            }
        };

        if product.version != Version::first() {
            return Err(ProductError::IllegalState(format!(
                "ProductCreated must carry version 1, found {}",
                product.version
            )));
        }

        for event in events {
            if event.product_id() != product.id {
                return Err(ProductError::IllegalState(format!(
                    "event for product {} found in history of product {}",
                    event.product_id(),
                    product.id
                )));
            }
            let expected = product.version.next();
            if event.version() != expected {
                return Err(ProductError::IllegalState(format!(
                    "expected event version {expected}, found {}",
                    event.version()
                )));
            }
            if matches!(event, ProductEvent::ProductCreated(_)) {
                return Err(ProductError::IllegalState(format!(
                    "duplicate ProductCreated at version {}",
                    event.version()
                )));
            }
            product.apply(event);
        }

        Ok(product)
    }
}

// Query methods
impl Product {
    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

// Command methods (return outcomes)
impl Product {
    /// Creates a new draft product with a fresh id.
    pub fn create(
        sku: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        price_cents: i64,
    ) -> Result<Outcome<Product>, ProductError> {
        Self::create_with_id(AggregateId::new(), sku, name, description, price_cents)
    }

    /// Creates a new draft product with a caller-chosen id.
    pub fn create_with_id(
        product_id: AggregateId,
        sku: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        price_cents: i64,
    ) -> Result<Outcome<Product>, ProductError> {
        let sku = Sku::parse(sku)?;
        let name = name.into();
        let description = description.into();
        validate_name(&name)?;
        validate_description(&description)?;
        let price = Money::price(price_cents)?;

        let data = ProductCreatedData {
            product_id,
            version: Version::first(),
            sku,
            name,
            description,
            price,
            occurred_at: Utc::now(),
        };

        let product = Self::from_created(data.clone());
        Ok(Outcome::from_parts(
            product,
            vec![ProductEvent::ProductCreated(data)],
        ))
    }

    /// Changes name and description. Unchanged values produce no event.
    pub fn update(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        expected_version: Version,
    ) -> Result<Outcome<Product>, ProductError> {
        self.guard(expected_version)?;

        let name = name.into();
        let description = description.into();
        validate_name(&name)?;
        validate_description(&description)?;

        if name == self.name && description == self.description {
            return Ok(Outcome::unchanged(self.clone()));
        }

        Ok(self.emit(ProductEvent::ProductUpdated(ProductUpdatedData {
            product_id: self.id,
            version: self.version.next(),
            name,
            description,
            previous_name: self.name.clone(),
            previous_description: self.description.clone(),
            occurred_at: Utc::now(),
        })))
    }

    /// Changes the price.
    ///
    /// On an active product a change of more than
    /// [`LARGE_PRICE_CHANGE_THRESHOLD`] percent fails unless
    /// `confirm_large_change` is set.
    pub fn change_price(
        &self,
        new_price_cents: i64,
        expected_version: Version,
        confirm_large_change: bool,
    ) -> Result<Outcome<Product>, ProductError> {
        self.guard(expected_version)?;

        let new_price = Money::price(new_price_cents)?;
        if new_price == self.price {
            return Ok(Outcome::unchanged(self.clone()));
        }

        let percentage_change = self.price.percentage_change_to(new_price);
        if self.status == ProductStatus::Active
            && percentage_change.abs() > LARGE_PRICE_CHANGE_THRESHOLD
            && !confirm_large_change
        {
            return Err(ProductError::PriceChangeThresholdExceeded {
                current_price: self.price,
                new_price,
                percentage_change,
                threshold: LARGE_PRICE_CHANGE_THRESHOLD,
            });
        }

        Ok(self.emit(ProductEvent::ProductPriceChanged(ProductPriceChangedData {
            product_id: self.id,
            version: self.version.next(),
            previous_price: self.price,
            new_price,
            percentage_change,
            confirmed: confirm_large_change,
            occurred_at: Utc::now(),
        })))
    }

    /// Makes a draft product available for sale.
    pub fn activate(&self, expected_version: Version) -> Result<Outcome<Product>, ProductError> {
        self.guard(expected_version)?;

        if !self.status.can_activate() {
            return Err(ProductError::InvalidStateTransition {
                current_status: self.status,
                action: "activate",
            });
        }

        Ok(self.emit(ProductEvent::ProductActivated(ProductActivatedData {
            product_id: self.id,
            version: self.version.next(),
            occurred_at: Utc::now(),
        })))
    }

    /// Withdraws a draft or active product from sale.
    pub fn discontinue(
        &self,
        expected_version: Version,
        reason: Option<String>,
    ) -> Result<Outcome<Product>, ProductError> {
        self.guard(expected_version)?;

        if !self.status.can_discontinue() {
            return Err(ProductError::InvalidStateTransition {
                current_status: self.status,
                action: "discontinue",
            });
        }

        Ok(self.emit(ProductEvent::ProductDiscontinued(ProductDiscontinuedData {
            product_id: self.id,
            version: self.version.next(),
            reason,
            occurred_at: Utc::now(),
        })))
    }

    /// Tombstones the product. Allowed from any status.
    pub fn delete(
        &self,
        expected_version: Version,
        deleted_by: Option<String>,
    ) -> Result<Outcome<Product>, ProductError> {
        self.guard(expected_version)?;

        Ok(self.emit(ProductEvent::ProductDeleted(ProductDeletedData {
            product_id: self.id,
            version: self.version.next(),
            deleted_by,
            occurred_at: Utc::now(),
        })))
    }
}

// Event application helpers
impl Product {
    fn from_created(data: ProductCreatedData) -> Self {
        Self {
            id: data.product_id,
            version: data.version,
            sku: data.sku,
            name: data.name,
            description: data.description,
            price: data.price,
            status: ProductStatus::Draft,
            created_at: data.occurred_at,
            updated_at: data.occurred_at,
            deleted_at: None,
        }
    }

    fn touch(&mut self, version: Version, at: DateTime<Utc>) {
        self.version = version;
        self.updated_at = at;
    }

    /// Checks the caller's version, then the tombstone.
    fn guard(&self, expected_version: Version) -> Result<(), ProductError> {
        if expected_version != self.version {
            return Err(ProductError::ConcurrencyConflict {
                expected: expected_version,
                actual: self.version,
            });
        }
        if self.is_deleted() {
            return Err(ProductError::DomainGone {
                product_id: self.id,
            });
        }
        Ok(())
    }

    fn emit(&self, event: ProductEvent) -> Outcome<Product> {
        Outcome::applied(self.clone(), vec![event])
    }
}
