//! Persistence for users, products and orders.
//!
//! # Schema: `shop`
//!
//! - `shop.user` - Accounts, credentials, activation and recovery tokens
//! - `shop.product` - Catalog
//! - `shop.order` - Order headers
//! - `shop.order_line` - Order lines (cascade-deleted with their order)
//!
//! The services talk to the three store traits below. [`users`], [`products`]
//! and [`orders`] implement them on `PostgreSQL`; [`memory`] implements all
//! three in process for tests.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p maxima-cli -- migrate
//! ```

pub mod memory;
pub mod orders;
pub mod products;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use maxima_core::account::RecoveryTicket;
use maxima_core::order::{Order, StatusChange};
use maxima_core::product::{Product, ProductDraft};
use maxima_core::{Email, OrderId, ProductId, UserId};

use crate::models::{NewUser, User, UserCredentials, UserUpdate};

pub use memory::MemoryStore;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to [`RepositoryError::Conflict`].
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `max_connections` - Upper bound on open connections
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(max_connections.min(2))
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Who holds a token, and the timestamp stored next to it.
///
/// For activation tokens `stamped_at` is the expiry; for recovery tokens it is
/// the issue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenHolder {
    pub user_id: UserId,
    pub stamped_at: Option<DateTime<Utc>>,
}

/// Storage for user accounts and their token fields.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new user. Fails with `Conflict` if the email is taken.
    async fn insert_user(&self, new_user: NewUser) -> Result<User, RepositoryError>;

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    async fn credentials_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<UserCredentials>, RepositoryError>;

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError>;

    /// Apply a partial profile update. Returns `None` if the user is missing.
    async fn update_profile(
        &self,
        id: UserId,
        update: &UserUpdate,
    ) -> Result<Option<User>, RepositoryError>;

    /// Returns false if the user did not exist.
    async fn delete_user(&self, id: UserId) -> Result<bool, RepositoryError>;

    /// Profile photo bytes, if the user exists and has one.
    async fn user_photo(&self, id: UserId) -> Result<Option<Vec<u8>>, RepositoryError>;

    /// Returns false if the user did not exist.
    async fn set_user_photo(&self, id: UserId, photo: Vec<u8>) -> Result<bool, RepositoryError>;

    /// Look up the holder of an activation token and its expiry.
    async fn activation_holder(&self, token: &str) -> Result<Option<TokenHolder>, RepositoryError>;

    /// Activate the account holding `token` if it has not expired at `now`.
    ///
    /// Clears both activation fields in the same write. At most one caller
    /// can succeed for a given token; the others get `None`.
    async fn consume_activation(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, RepositoryError>;

    /// Store a recovery ticket on the user with `email`, replacing any
    /// previous one. Returns `None` if no user has that email.
    async fn issue_recovery(
        &self,
        email: &Email,
        ticket: &RecoveryTicket,
    ) -> Result<Option<UserId>, RepositoryError>;

    /// The outstanding recovery token for `email`, if any.
    async fn recovery_token(&self, email: &Email) -> Result<Option<String>, RepositoryError>;

    /// Look up the holder of a recovery token and its issue time.
    async fn recovery_holder(&self, token: &str) -> Result<Option<TokenHolder>, RepositoryError>;

    /// Replace the password of the user holding `token` if the token was
    /// issued at or after `not_before`, clearing both recovery fields.
    ///
    /// At most one caller can succeed for a given token.
    async fn consume_recovery(
        &self,
        token: &str,
        not_before: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<UserId>, RepositoryError>;
}

/// Storage for catalog products.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_product(&self, draft: &ProductDraft) -> Result<Product, RepositoryError>;

    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError>;

    /// Replace every editable field. Returns `None` if the product is missing.
    async fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Returns false if the product did not exist.
    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError>;

    async fn product_image(&self, id: ProductId) -> Result<Option<Vec<u8>>, RepositoryError>;

    /// Returns false if the product did not exist.
    async fn set_product_image(
        &self,
        id: ProductId,
        image: Vec<u8>,
    ) -> Result<bool, RepositoryError>;
}

/// Storage for order aggregates.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order and all of its lines atomically.
    async fn insert_order(&self, order: &Order) -> Result<Order, RepositoryError>;

    async fn order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError>;

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Write a status change if the stored status still equals `change.from`.
    ///
    /// Returns false when the order is missing or its status moved underneath.
    async fn update_status(
        &self,
        id: OrderId,
        change: &StatusChange,
    ) -> Result<bool, RepositoryError>;

    /// Persist the line list and totals of `order` while it is still being
    /// prepared. Lines absent from `order` are deleted; lines without an ID
    /// are inserted.
    ///
    /// Returns false when the order is missing or no longer editable.
    async fn save_lines(&self, id: OrderId, order: &Order) -> Result<bool, RepositoryError>;

    /// Delete an order and its lines. Returns false if it did not exist.
    async fn delete_order(&self, id: OrderId) -> Result<bool, RepositoryError>;
}

/// The three stores behind one handle.
#[derive(Clone)]
pub struct Stores {
    pub accounts: Arc<dyn AccountStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub orders: Arc<dyn OrderStore>,
}

impl Stores {
    /// `PostgreSQL`-backed stores sharing one pool.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            accounts: Arc::new(UserRepository::new(pool.clone())),
            catalog: Arc::new(ProductRepository::new(pool.clone())),
            orders: Arc::new(OrderRepository::new(pool.clone())),
        }
    }

    /// In-process stores sharing one [`MemoryStore`].
    #[must_use]
    pub fn memory(store: &MemoryStore) -> Self {
        Self {
            accounts: Arc::new(store.clone()),
            catalog: Arc::new(store.clone()),
            orders: Arc::new(store.clone()),
        }
    }
}
