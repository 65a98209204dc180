//! Product catalog records.

use chrono::{DateTime, Utc};
use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::Money;

/// A catalog product.
///
/// Immutable with respect to the order flow; catalog edits go through the
/// admin API with last-write-wins semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub description: Option<String>,
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub unit_price: Money,
    pub description: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl NewProduct {
    /// Creates product input with just a name and price.
    pub fn new(name: impl Into<String>, unit_price: Money) -> Self {
        Self {
            name: name.into(),
            unit_price,
            description: None,
            image_urls: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_product_builder() {
        let input = NewProduct::new("Widget", Money::from_cents(9999)).with_description("A widget");
        assert_eq!(input.name, "Widget");
        assert_eq!(input.description.as_deref(), Some("A widget"));
        assert!(input.image_urls.is_empty());
    }
}
