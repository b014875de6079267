//! Product lifecycle status.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a product.
///
/// ```text
/// Draft ──► Active ──► Discontinued
///   │                      ▲
///   └──────────────────────┘
/// ```
///
/// Deletion is tracked separately as a tombstone and blocks every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    /// Created but not yet offered for sale.
    #[default]
    Draft,

    /// Available for sale.
    Active,

    /// No longer offered (terminal).
    Discontinued,
}

impl ProductStatus {
    pub fn can_activate(&self) -> bool {
        matches!(self, ProductStatus::Draft)
    }

    pub fn can_discontinue(&self) -> bool {
        matches!(self, ProductStatus::Draft | ProductStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Draft => "DRAFT",
            ProductStatus::Active => "ACTIVE",
            ProductStatus::Discontinued => "DISCONTINUED",
        }
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(ProductStatus::Draft),
            "ACTIVE" => Ok(ProductStatus::Active),
            "DISCONTINUED" => Ok(ProductStatus::Discontinued),
            other => Err(format!("unknown product status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions() {
        assert!(ProductStatus::Draft.can_activate());
        assert!(!ProductStatus::Active.can_activate());
        assert!(!ProductStatus::Discontinued.can_activate());

        assert!(ProductStatus::Draft.can_discontinue());
        assert!(ProductStatus::Active.can_discontinue());
        assert!(!ProductStatus::Discontinued.can_discontinue());
    }

    #[test]
    fn string_form_round_trips() {
        for status in [
            ProductStatus::Draft,
            ProductStatus::Active,
            ProductStatus::Discontinued,
        ] {
            assert_eq!(status.as_str().parse::<ProductStatus>(), Ok(status));
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::json!(status.as_str())
            );
        }
        assert!("RETIRED".parse::<ProductStatus>().is_err());
    }
}
