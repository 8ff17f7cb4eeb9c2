//! Product repository for database operations.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use maxima_core::ProductId;
use maxima_core::product::{Product, ProductDraft};

use super::{CatalogStore, RepositoryError};

const PRODUCT_COLUMNS: &str = "id, name, description, price, stock, image IS NOT NULL AS has_image";

/// Internal row type for product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    description: Option<String>,
    price: Decimal,
    stock: i32,
    has_image: bool,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price: row.price,
            stock: row.stock,
            has_image: row.has_image,
        }
    }
}

/// Repository for catalog database operations.
#[derive(Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for ProductRepository {
    async fn insert_product(&self, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO shop.product (name, description, price, stock)
            VALUES ($1, $2, $3, $4)
            RETURNING {PRODUCT_COLUMNS}
            "
        );

        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(draft.name())
            .bind(draft.description())
            .bind(draft.price())
            .bind(draft.stock())
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Product::from))
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM shop.product ORDER BY id");
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Option<Product>, RepositoryError> {
        let sql = format!(
            r"
            UPDATE shop.product
            SET name = $2, description = $3, price = $4, stock = $5
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        );

        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(draft.name())
            .bind(draft.description())
            .bind(draft.price())
            .bind(draft.stock())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Product::from))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn product_image(&self, id: ProductId) -> Result<Option<Vec<u8>>, RepositoryError> {
        let image: Option<Option<Vec<u8>>> =
            sqlx::query_scalar("SELECT image FROM shop.product WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(image.flatten())
    }

    async fn set_product_image(
        &self,
        id: ProductId,
        image: Vec<u8>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE shop.product SET image = $2 WHERE id = $1")
            .bind(id)
            .bind(image)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
