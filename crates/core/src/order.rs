//! The order aggregate.
//!
//! An [`Order`] exclusively owns its [`OrderLine`]s. Subtotal and total are
//! always derived from the lines and are never set directly; every operation
//! that touches the line list goes through the aggregate root and recomputes
//! them.
//!
//! # Status machine
//!
//! ```text
//! EN_PREPARACION ──► ENVIADO ──► ENTREGADO (terminal)
//!        │              │
//!        └──────────────┴──────► CANCELADO (terminal)
//! ```
//!
//! Only the terminal guard is enforced: from a non-terminal status any target
//! is accepted, including skipping `ENVIADO`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{OrderId, OrderLineId, OrderStatus, ProductId, UserId};

/// Errors raised by the order aggregate.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// A line was built with a quantity of zero or less.
    #[error("quantity must be greater than zero (got {0})")]
    InvalidQuantity(i32),
    /// A line was built with a negative unit price.
    #[error("unit price cannot be negative")]
    NegativePrice,
    /// A line subtotal or order total exceeds [`max_amount`].
    #[error("amount exceeds the largest storable value")]
    Overflow,
    /// An order must contain at least one line.
    #[error("an order needs at least one line")]
    NoLines,
    /// The order is in a terminal status.
    #[error("order is already finalized ({0})")]
    AlreadyFinalized(OrderStatus),
    /// Lines can only be changed while the order is being prepared.
    #[error("order lines cannot change once the order is {0}")]
    LinesLocked(OrderStatus),
    /// No line at the requested position.
    #[error("order has no line at position {0}")]
    NoSuchLine(usize),
}

/// Largest line subtotal or order total that can be stored (`NUMERIC(14, 2)`).
#[must_use]
pub fn max_amount() -> Decimal {
    Decimal::new(99_999_999_999_999, 2)
}

/// One priced line of an order.
///
/// Product name and unit price are captured when the order is placed, so later
/// catalog edits never change historical orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    id: Option<OrderLineId>,
    product_id: ProductId,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
    subtotal: Decimal,
}

impl OrderLine {
    /// Build a new, not yet persisted line.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidQuantity`] if `quantity <= 0`,
    /// [`OrderError::NegativePrice`] if `unit_price < 0` and
    /// [`OrderError::Overflow`] if the subtotal cannot be represented.
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        unit_price: Decimal,
        quantity: i32,
    ) -> Result<Self, OrderError> {
        if quantity <= 0 {
            return Err(OrderError::InvalidQuantity(quantity));
        }
        if unit_price < Decimal::ZERO {
            return Err(OrderError::NegativePrice);
        }
        let subtotal = unit_price
            .checked_mul(Decimal::from(quantity))
            .filter(|s| *s <= max_amount())
            .ok_or(OrderError::Overflow)?;

        Ok(Self {
            id: None,
            product_id,
            product_name: product_name.into(),
            unit_price,
            quantity,
            subtotal,
        })
    }

    /// Rebuild a line from storage.
    #[must_use]
    pub fn restore(record: OrderLineRecord) -> Self {
        Self {
            id: Some(record.id),
            product_id: record.product_id,
            product_name: record.product_name,
            unit_price: record.unit_price,
            quantity: record.quantity,
            subtotal: record.subtotal,
        }
    }

    #[must_use]
    pub const fn id(&self) -> Option<OrderLineId> {
        self.id
    }

    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        self.product_id
    }

    #[must_use]
    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    #[must_use]
    pub const fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    #[must_use]
    pub const fn quantity(&self) -> i32 {
        self.quantity
    }

    #[must_use]
    pub const fn subtotal(&self) -> Decimal {
        self.subtotal
    }
}

/// Stored form of an order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineRecord {
    pub id: OrderLineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
}

/// Stored form of an order with its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub id: OrderId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub lines: Vec<OrderLineRecord>,
}

/// The outcome of a successful [`Order::change_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    /// Status the decision was made from.
    pub from: OrderStatus,
    /// Status now held by the order.
    pub to: OrderStatus,
    /// Delivery timestamp after the change.
    pub delivered_at: Option<DateTime<Utc>>,
}

/// An order and its owned lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: Option<OrderId>,
    user_id: UserId,
    created_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
    subtotal: Decimal,
    total: Decimal,
    status: OrderStatus,
    lines: Vec<OrderLine>,
}

impl Order {
    /// Place a new order for `user_id`.
    ///
    /// The order starts in `EN_PREPARACION`, has no delivery timestamp and its
    /// total equals its subtotal.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NoLines`] if `lines` is empty and
    /// [`OrderError::Overflow`] if the sum cannot be represented.
    pub fn place(
        user_id: UserId,
        lines: Vec<OrderLine>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::NoLines);
        }

        let mut order = Self {
            id: None,
            user_id,
            created_at: now,
            delivered_at: None,
            subtotal: Decimal::ZERO,
            total: Decimal::ZERO,
            status: OrderStatus::EnPreparacion,
            lines,
        };
        order.recompute_totals()?;
        Ok(order)
    }

    /// Rebuild an order from storage. Stored values are trusted as-is.
    #[must_use]
    pub fn restore(record: OrderRecord) -> Self {
        Self {
            id: Some(record.id),
            user_id: record.user_id,
            created_at: record.created_at,
            delivered_at: record.delivered_at,
            subtotal: record.subtotal,
            total: record.total,
            status: record.status,
            lines: record.lines.into_iter().map(OrderLine::restore).collect(),
        }
    }

    /// Move the order to `next`.
    ///
    /// Entering `ENTREGADO` stamps the delivery timestamp with `now`; no other
    /// transition touches it.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::AlreadyFinalized`] if the current status is
    /// terminal. The order is left unchanged in that case.
    pub fn change_status(
        &mut self,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, OrderError> {
        let from = self.status;
        if from.is_terminal() {
            return Err(OrderError::AlreadyFinalized(from));
        }

        if next == OrderStatus::Entregado {
            self.delivered_at = Some(now);
        }
        self.status = next;

        Ok(StatusChange {
            from,
            to: next,
            delivered_at: self.delivered_at,
        })
    }

    /// Remove and return the line at `index`.
    ///
    /// # Errors
    ///
    /// Fails if the order is past `EN_PREPARACION`, if `index` is out of range,
    /// or if the line is the last one.
    pub fn remove_line(&mut self, index: usize) -> Result<OrderLine, OrderError> {
        self.ensure_lines_editable()?;
        if index >= self.lines.len() {
            return Err(OrderError::NoSuchLine(index));
        }
        if self.lines.len() == 1 {
            return Err(OrderError::NoLines);
        }

        let removed = self.lines.remove(index);
        self.recompute_totals()?;
        Ok(removed)
    }

    /// Replace every line, returning the previous ones.
    ///
    /// # Errors
    ///
    /// Fails if the order is past `EN_PREPARACION` or `lines` is empty. On
    /// error the order is left unchanged.
    pub fn replace_lines(&mut self, lines: Vec<OrderLine>) -> Result<Vec<OrderLine>, OrderError> {
        self.ensure_lines_editable()?;
        if lines.is_empty() {
            return Err(OrderError::NoLines);
        }

        let (subtotal, total) = Self::totals_of(&lines)?;
        let previous = std::mem::replace(&mut self.lines, lines);
        self.subtotal = subtotal;
        self.total = total;
        Ok(previous)
    }

    #[must_use]
    pub const fn id(&self) -> Option<OrderId> {
        self.id
    }

    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    #[must_use]
    pub const fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    #[must_use]
    pub const fn total(&self) -> Decimal {
        self.total
    }

    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    #[must_use]
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    const fn ensure_lines_editable(&self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::EnPreparacion => Ok(()),
            other => Err(OrderError::LinesLocked(other)),
        }
    }

    fn recompute_totals(&mut self) -> Result<(), OrderError> {
        let (subtotal, total) = Self::totals_of(&self.lines)?;
        self.subtotal = subtotal;
        self.total = total;
        Ok(())
    }

    // No discounts or shipping yet, so total == subtotal.
    fn totals_of(lines: &[OrderLine]) -> Result<(Decimal, Decimal), OrderError> {
        let subtotal = lines.iter().try_fold(Decimal::ZERO, |acc, line| {
            acc.checked_add(line.subtotal)
                .filter(|s| *s <= max_amount())
                .ok_or(OrderError::Overflow)
        })?;
        Ok((subtotal, subtotal))
    }
}
