//! Value objects for the product domain.

use serde::{Deserialize, Serialize};

use super::ProductError;

/// Minimum SKU length, inclusive.
pub const SKU_MIN_LENGTH: usize = 3;

/// Maximum SKU length, inclusive.
pub const SKU_MAX_LENGTH: usize = 50;

/// Maximum product name length.
pub const NAME_MAX_LENGTH: usize = 255;

/// Maximum product description length.
pub const DESCRIPTION_MAX_LENGTH: usize = 5000;

/// Stock keeping unit. Immutable once a product is created.
///
/// Between 3 and 50 characters, ASCII letters, digits and `-` only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Validates and wraps a SKU.
    pub fn parse(sku: impl Into<String>) -> Result<Self, ProductError> {
        let sku = sku.into();
        let length = sku.chars().count();
        if !(SKU_MIN_LENGTH..=SKU_MAX_LENGTH).contains(&length) {
            return Err(ProductError::invariant(
                "sku_length",
                format!(
                    "SKU must be between {SKU_MIN_LENGTH} and {SKU_MAX_LENGTH} characters, got {length}"
                ),
            ));
        }
        if !sku.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ProductError::invariant(
                "sku_format",
                format!("SKU may only contain letters, digits and '-': {sku}"),
            ));
        }
        Ok(Self(sku))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Sku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Sku {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// A price: strictly positive.
    pub fn price(cents: i64) -> Result<Self, ProductError> {
        if cents <= 0 {
            return Err(ProductError::invariant(
                "price_positive",
                format!("price must be greater than 0, got {cents} cents"),
            ));
        }
        Ok(Self(cents))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.0.abs() % 100
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Relative change from `self` to `new`, in percent.
    ///
    /// `(new - old) / old * 100`. Returns 0 when `self` is zero.
    pub fn percentage_change_to(&self, new: Money) -> f64 {
        if self.0 == 0 {
            return 0.0;
        }
        (new.0 - self.0) as f64 / self.0 as f64 * 100.0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

/// Validates a product name: 1 to 255 characters, not blank.
pub fn validate_name(name: &str) -> Result<(), ProductError> {
    let length = name.chars().count();
    if name.trim().is_empty() || length > NAME_MAX_LENGTH {
        return Err(ProductError::invariant(
            "name_length",
            format!("name must be between 1 and {NAME_MAX_LENGTH} characters, got {length}"),
        ));
    }
    Ok(())
}

/// Validates a product description: at most 5000 characters.
pub fn validate_description(description: &str) -> Result<(), ProductError> {
    let length = description.chars().count();
    if length > DESCRIPTION_MAX_LENGTH {
        return Err(ProductError::invariant(
            "description_length",
            format!("description must be at most {DESCRIPTION_MAX_LENGTH} characters, got {length}"),
        ));
    }
    Ok(())
}
