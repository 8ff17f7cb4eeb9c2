//! Catalog entries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ProductId;

/// Errors that can occur when validating a [`ProductDraft`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductError {
    /// Name missing or blank.
    #[error("product name is required")]
    NameRequired,
    /// Price missing, negative, finer than cents or above [`max_price`].
    #[error("product price is not valid")]
    InvalidPrice,
    /// Stock missing, negative or out of range.
    #[error("product stock is not valid")]
    InvalidStock,
}

/// Decimal places kept for catalog prices.
pub const PRICE_SCALE: u32 = 2;

/// Largest price the catalog stores (`NUMERIC(12, 2)`).
#[must_use]
pub fn max_price() -> Decimal {
    Decimal::new(999_999_999_999, PRICE_SCALE)
}

/// A catalog product as stored.
///
/// Image bytes are kept out of this type; `has_image` tells clients whether
/// `GET /products/{id}/image` will return anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub has_image: bool,
}

/// Validated product fields, used for both create and full update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    name: String,
    description: Option<String>,
    price: Decimal,
    stock: i32,
}

impl ProductDraft {
    /// Validate raw product fields.
    ///
    /// The name is trimmed; an empty description becomes `None`. The price is
    /// carried with exactly two decimal places (`10.5` becomes `10.50`).
    ///
    /// # Errors
    ///
    /// Returns [`ProductError`] for the first invalid field, checked in the
    /// order name, price, stock.
    pub fn new(
        name: Option<&str>,
        description: Option<&str>,
        price: Option<Decimal>,
        stock: Option<i64>,
    ) -> Result<Self, ProductError> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(ProductError::NameRequired)?;

        let mut price = price
            .filter(|p| *p >= Decimal::ZERO && *p <= max_price())
            .filter(|p| p.normalize().scale() <= PRICE_SCALE)
            .ok_or(ProductError::InvalidPrice)?;
        price.rescale(PRICE_SCALE);

        let stock = stock
            .and_then(|s| i32::try_from(s).ok())
            .filter(|s| *s >= 0)
            .ok_or(ProductError::InvalidStock)?;

        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_owned);

        Ok(Self {
            name: name.to_owned(),
            description,
            price,
            stock,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub const fn price(&self) -> Decimal {
        self.price
    }

    #[must_use]
    pub const fn stock(&self) -> i32 {
        self.stock
    }
}
