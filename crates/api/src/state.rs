//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use maxima_core::account::TokenLifetimes;

use crate::config::ApiConfig;
use crate::db::Stores;
use crate::services::{AccountService, OrderWorkflow, TokenIssuer};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    stores: Stores,
    issuer: TokenIssuer,
    lifetimes: TokenLifetimes,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create state backed by `PostgreSQL`.
    #[must_use]
    pub fn new(config: &ApiConfig, pool: PgPool) -> Self {
        let issuer = TokenIssuer::new(&config.jwt_secret, config.jwt_ttl);
        Self {
            inner: Arc::new(AppStateInner {
                stores: Stores::postgres(&pool),
                issuer,
                lifetimes: config.token_lifetimes,
                pool: Some(pool),
            }),
        }
    }

    /// Create state over arbitrary stores, without a database pool.
    ///
    /// Readiness always reports ready in this mode.
    #[must_use]
    pub fn with_stores(stores: Stores, issuer: TokenIssuer, lifetimes: TokenLifetimes) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                stores,
                issuer,
                lifetimes,
                pool: None,
            }),
        }
    }

    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.inner.stores
    }

    #[must_use]
    pub fn issuer(&self) -> &TokenIssuer {
        &self.inner.issuer
    }

    /// The database pool, if this state is backed by one.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Account service over this state's stores.
    #[must_use]
    pub fn accounts(&self) -> AccountService<'_> {
        AccountService::new(&self.inner.stores, &self.inner.issuer, self.inner.lifetimes)
    }

    /// Order workflow over this state's stores.
    #[must_use]
    pub fn orders(&self) -> OrderWorkflow<'_> {
        OrderWorkflow::new(&self.inner.stores)
    }
}
