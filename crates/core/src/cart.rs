//! Client-supplied carts.
//!
//! A cart arrives as a JSON object mapping product IDs (as strings) to
//! quantities. Quantities may be `null` on the wire, so the raw form keeps
//! them optional until [`Cart::parse`] has checked every entry.

use std::collections::{BTreeMap, BTreeSet};

use crate::ProductId;

/// Raw cart exactly as it is deserialized from a request body.
pub type RawCart = BTreeMap<String, Option<i64>>;

/// Errors that can occur when parsing a [`Cart`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// The cart has no entries.
    #[error("the cart is empty")]
    Empty,
    /// A key is not a numeric product ID.
    #[error("invalid product id: {0:?}")]
    InvalidProductId(String),
    /// A quantity is missing, zero, negative or out of range.
    #[error("invalid quantity for product {0}")]
    InvalidQuantity(ProductId),
    /// Two keys resolve to the same product (e.g. `"5"` and `"05"`).
    #[error("product {0} appears more than once in the cart")]
    DuplicateProduct(ProductId),
}

/// A single validated cart entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartItem {
    /// Product being ordered.
    pub product_id: ProductId,
    /// Requested quantity, always positive.
    pub quantity: i32,
}

/// A validated, non-empty cart with one entry per distinct product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Validate a raw cart.
    ///
    /// Entries are returned in ascending product ID order.
    ///
    /// # Errors
    ///
    /// Returns [`CartError`] for the first invalid entry found.
    pub fn parse(raw: &RawCart) -> Result<Self, CartError> {
        if raw.is_empty() {
            return Err(CartError::Empty);
        }

        let mut seen = BTreeSet::new();
        let mut items = Vec::with_capacity(raw.len());

        for (key, quantity) in raw {
            let product_id: ProductId = key
                .parse()
                .map_err(|_| CartError::InvalidProductId(key.clone()))?;

            let quantity = quantity
                .and_then(|q| i32::try_from(q).ok())
                .filter(|q| *q > 0)
                .ok_or(CartError::InvalidQuantity(product_id))?;

            if !seen.insert(product_id) {
                return Err(CartError::DuplicateProduct(product_id));
            }

            items.push(CartItem {
                product_id,
                quantity,
            });
        }

        items.sort_by_key(|item| item.product_id);
        Ok(Self { items })
    }

    /// The validated entries.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Number of distinct products in the cart.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false; a parsed cart has at least one entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
