//! Order repository for database operations.
//!
//! An order is stored as one `shop.order` row plus its `shop.order_line` rows.
//! Every write that touches both tables runs in a single transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use maxima_core::order::{Order, OrderLine, OrderLineRecord, OrderRecord, StatusChange};
use maxima_core::{OrderId, OrderLineId, OrderStatus, ProductId, UserId};

use super::{OrderStore, RepositoryError};

const ORDER_COLUMNS: &str = "id, user_id, created_at, delivered_at, subtotal, total, status";
const LINE_COLUMNS: &str =
    "id, order_id, product_id, product_name, unit_price, quantity, subtotal";

/// Internal row type for order headers.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    created_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
    subtotal: Decimal,
    total: Decimal,
    status: String,
}

/// Internal row type for order lines.
#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    id: i64,
    order_id: i64,
    product_id: i64,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
    subtotal: Decimal,
}

impl From<OrderLineRow> for OrderLineRecord {
    fn from(row: OrderLineRow) -> Self {
        Self {
            id: OrderLineId::new(row.id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity: row.quantity,
            subtotal: row.subtotal,
        }
    }
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLineRow>) -> Result<Order, RepositoryError> {
        let status: OrderStatus = self.status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", self.id))
        })?;

        Ok(Order::restore(OrderRecord {
            id: OrderId::new(self.id),
            user_id: UserId::new(self.user_id),
            created_at: self.created_at,
            delivered_at: self.delivered_at,
            subtotal: self.subtotal,
            total: self.total,
            status,
            lines: lines.into_iter().map(OrderLineRecord::from).collect(),
        }))
    }
}

/// Repository for order database operations.
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the lines for `headers` and assemble full aggregates, keeping the
    /// header order.
    async fn with_lines(&self, headers: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if headers.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = headers.iter().map(|h| h.id).collect();
        let sql = format!(
            r"
            SELECT {LINE_COLUMNS}
            FROM shop.order_line
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "
        );
        let rows = sqlx::query_as::<_, OrderLineRow>(&sql)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        let mut by_order: HashMap<i64, Vec<OrderLineRow>> = HashMap::new();
        for row in rows {
            by_order.entry(row.order_id).or_default().push(row);
        }

        headers
            .into_iter()
            .map(|header| {
                let lines = by_order.remove(&header.id).unwrap_or_default();
                header.into_order(lines)
            })
            .collect()
    }
}

async fn insert_line(
    tx: &mut Transaction<'_, Postgres>,
    order_id: i64,
    position: i32,
    line: &OrderLine,
) -> Result<OrderLineRow, RepositoryError> {
    let sql = format!(
        r"
        INSERT INTO shop.order_line (
            order_id, position, product_id, product_name, unit_price, quantity, subtotal
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {LINE_COLUMNS}
        "
    );

    let row = sqlx::query_as::<_, OrderLineRow>(&sql)
        .bind(order_id)
        .bind(position)
        .bind(line.product_id())
        .bind(line.product_name())
        .bind(line.unit_price())
        .bind(line.quantity())
        .bind(line.subtotal())
        .fetch_one(&mut **tx)
        .await?;

    Ok(row)
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn insert_order(&self, order: &Order) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r"
            INSERT INTO shop.order (user_id, created_at, delivered_at, subtotal, total, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ORDER_COLUMNS}
            "
        );
        let header = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order.user_id())
            .bind(order.created_at())
            .bind(order.delivered_at())
            .bind(order.subtotal())
            .bind(order.total())
            .bind(order.status().as_str())
            .fetch_one(&mut *tx)
            .await?;

        let mut lines = Vec::with_capacity(order.lines().len());
        for (position, line) in (0_i32..).zip(order.lines()) {
            lines.push(insert_line(&mut tx, header.id, position, line).await?);
        }

        tx.commit().await?;

        header.into_order(lines)
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM shop.order WHERE id = $1");
        let header = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match header {
            Some(h) => Ok(self.with_lines(vec![h]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM shop.order ORDER BY id");
        let headers = sqlx::query_as::<_, OrderRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        self.with_lines(headers).await
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM shop.order WHERE user_id = $1 ORDER BY id");
        let headers = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        self.with_lines(headers).await
    }

    async fn update_status(
        &self,
        id: OrderId,
        change: &StatusChange,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.order
            SET status = $3, delivered_at = $4
            WHERE id = $1 AND status = $2
            ",
        )
        .bind(id)
        .bind(change.from.as_str())
        .bind(change.to.as_str())
        .bind(change.delivered_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn save_lines(&self, id: OrderId, order: &Order) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r"
            UPDATE shop.order
            SET subtotal = $2, total = $3
            WHERE id = $1 AND status = $4
            ",
        )
        .bind(id)
        .bind(order.subtotal())
        .bind(order.total())
        .bind(OrderStatus::EnPreparacion.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        let kept: Vec<i64> = order
            .lines()
            .iter()
            .filter_map(|line| line.id().map(|line_id| line_id.as_i64()))
            .collect();

        sqlx::query("DELETE FROM shop.order_line WHERE order_id = $1 AND NOT (id = ANY($2))")
            .bind(id)
            .bind(&kept)
            .execute(&mut *tx)
            .await?;

        for (position, line) in (0_i32..).zip(order.lines()) {
            match line.id() {
                Some(line_id) => {
                    sqlx::query("UPDATE shop.order_line SET position = $2 WHERE id = $1")
                        .bind(line_id)
                        .bind(position)
                        .execute(&mut *tx)
                        .await?;
                }
                None => {
                    insert_line(&mut tx, id.as_i64(), position, line).await?;
                }
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool, RepositoryError> {
        // Lines go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM shop.order WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
