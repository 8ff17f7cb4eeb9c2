//! In-memory implementation of the store traits.
//!
//! Used by the workflow and router tests, and handy for local experiments
//! without a database. One lock guards all tables, so every operation is
//! atomic with respect to every other.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use maxima_core::account::RecoveryTicket;
use maxima_core::order::{Order, OrderLineRecord, OrderRecord, StatusChange};
use maxima_core::product::{Product, ProductDraft};
use maxima_core::{Email, OrderId, OrderLineId, OrderStatus, ProductId, UserId, UserRole};

use super::{AccountStore, CatalogStore, OrderStore, RepositoryError, TokenHolder};
use crate::models::{NewUser, User, UserCredentials, UserUpdate};

#[derive(Debug, Clone)]
struct UserEntry {
    name: Option<String>,
    surname: Option<String>,
    birth_date: Option<NaiveDate>,
    phone: Option<String>,
    email: Email,
    role: UserRole,
    password_hash: String,
    active: bool,
    activation_token: Option<String>,
    activation_expires_at: Option<DateTime<Utc>>,
    recovery_token: Option<String>,
    recovery_issued_at: Option<DateTime<Utc>>,
    photo: Option<Vec<u8>>,
    created_at: DateTime<Utc>,
}

impl UserEntry {
    fn to_user(&self, id: i64) -> User {
        User {
            id: UserId::new(id),
            name: self.name.clone(),
            surname: self.surname.clone(),
            birth_date: self.birth_date,
            phone: self.phone.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            active: self.active,
            has_photo: self.photo.is_some(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone)]
struct ProductEntry {
    product: Product,
    image: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, UserEntry>,
    products: BTreeMap<i64, ProductEntry>,
    orders: BTreeMap<i64, Order>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn user_by_email_mut(&mut self, email: &Email) -> Option<(i64, &mut UserEntry)> {
        self.users
            .iter_mut()
            .find(|(_, u)| u.email == *email)
            .map(|(id, u)| (*id, u))
    }

    fn holder_of(
        &self,
        token: &str,
        field: impl Fn(&UserEntry) -> (Option<&str>, Option<DateTime<Utc>>),
    ) -> Option<TokenHolder> {
        self.users.iter().find_map(|(id, u)| {
            let (held, stamped_at) = field(u);
            (held == Some(token)).then(|| TokenHolder {
                user_id: UserId::new(*id),
                stamped_at,
            })
        })
    }

    /// Give every unsaved line of `order` an ID, and the order too if it
    /// has none.
    fn assign_ids(&mut self, order: &Order, id: Option<OrderId>) -> Order {
        let id = id.unwrap_or_else(|| OrderId::new(self.next_id()));
        let lines = order
            .lines()
            .iter()
            .map(|line| OrderLineRecord {
                id: line
                    .id()
                    .unwrap_or_else(|| OrderLineId::new(self.next_id())),
                product_id: line.product_id(),
                product_name: line.product_name().to_owned(),
                unit_price: line.unit_price(),
                quantity: line.quantity(),
                subtotal: line.subtotal(),
            })
            .collect();

        Order::restore(OrderRecord {
            id,
            user_id: order.user_id(),
            created_at: order.created_at(),
            delivered_at: order.delivered_at(),
            subtotal: order.subtotal(),
            total: order.total(),
            status: order.status(),
            lines,
        })
    }
}

/// Thread-safe in-memory store implementing every store trait.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the activation expiry of a user. Test helper for expiry paths.
    pub async fn set_activation_expiry(&self, id: UserId, expires_at: Option<DateTime<Utc>>) {
        if let Some(user) = self.tables.write().await.users.get_mut(&id.as_i64()) {
            user.activation_expires_at = expires_at;
        }
    }

    /// Overwrite the recovery issue time of a user. Test helper for expiry paths.
    pub async fn set_recovery_issued_at(&self, id: UserId, issued_at: Option<DateTime<Utc>>) {
        if let Some(user) = self.tables.write().await.users.get_mut(&id.as_i64()) {
            user.recovery_issued_at = issued_at;
        }
    }

    /// Stored password hash of a user.
    pub async fn password_hash(&self, id: UserId) -> Option<String> {
        self.tables
            .read()
            .await
            .users
            .get(&id.as_i64())
            .map(|u| u.password_hash.clone())
    }

    /// Number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert_user(&self, new_user: NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == new_user.email) {
            return Err(RepositoryError::Conflict(
                "user with this email already exists".to_owned(),
            ));
        }

        let id = tables.next_id();
        let entry = UserEntry {
            name: new_user.profile.name,
            surname: new_user.profile.surname,
            birth_date: new_user.profile.birth_date,
            phone: new_user.profile.phone,
            email: new_user.email,
            role: new_user.role,
            password_hash: new_user.password_hash,
            active: false,
            activation_token: Some(new_user.activation.token),
            activation_expires_at: Some(new_user.activation.expires_at),
            recovery_token: None,
            recovery_issued_at: None,
            photo: None,
            created_at: Utc::now(),
        };
        let user = entry.to_user(id);
        tables.users.insert(id, entry);
        Ok(user)
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .get(&id.as_i64())
            .map(|u| u.to_user(id.as_i64())))
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|(_, u)| u.email == *email)
            .map(|(id, u)| u.to_user(*id)))
    }

    async fn credentials_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|(_, u)| u.email == *email)
            .map(|(id, u)| UserCredentials {
                user: u.to_user(*id),
                password_hash: u.password_hash.clone(),
            }))
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().map(|(id, u)| u.to_user(*id)).collect())
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &UserUpdate,
    ) -> Result<Option<User>, RepositoryError> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(&id.as_i64()) else {
            return Ok(None);
        };

        if let Some(name) = &update.name {
            user.name = Some(name.clone());
        }
        if let Some(surname) = &update.surname {
            user.surname = Some(surname.clone());
        }
        if let Some(birth_date) = update.birth_date {
            user.birth_date = Some(birth_date);
        }
        if let Some(phone) = &update.phone {
            user.phone = Some(phone.clone());
        }

        Ok(Some(user.to_user(id.as_i64())))
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, RepositoryError> {
        Ok(self
            .tables
            .write()
            .await
            .users
            .remove(&id.as_i64())
            .is_some())
    }

    async fn user_photo(&self, id: UserId) -> Result<Option<Vec<u8>>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .get(&id.as_i64())
            .and_then(|u| u.photo.clone()))
    }

    async fn set_user_photo(&self, id: UserId, photo: Vec<u8>) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(&id.as_i64()) else {
            return Ok(false);
        };
        user.photo = Some(photo);
        Ok(true)
    }

    async fn activation_holder(&self, token: &str) -> Result<Option<TokenHolder>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.holder_of(token, |u| {
            (u.activation_token.as_deref(), u.activation_expires_at)
        }))
    }

    async fn consume_activation(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, RepositoryError> {
        let mut tables = self.tables.write().await;
        let holder = tables.users.iter_mut().find(|(_, u)| {
            u.activation_token.as_deref() == Some(token)
                && u.activation_expires_at.is_some_and(|expiry| expiry >= now)
        });

        Ok(holder.map(|(id, user)| {
            user.active = true;
            user.activation_token = None;
            user.activation_expires_at = None;
            UserId::new(*id)
        }))
    }

    async fn issue_recovery(
        &self,
        email: &Email,
        ticket: &RecoveryTicket,
    ) -> Result<Option<UserId>, RepositoryError> {
        let mut tables = self.tables.write().await;
        Ok(tables.user_by_email_mut(email).map(|(id, user)| {
            user.recovery_token = Some(ticket.token.clone());
            user.recovery_issued_at = Some(ticket.issued_at);
            UserId::new(id)
        }))
    }

    async fn recovery_token(&self, email: &Email) -> Result<Option<String>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email == *email)
            .and_then(|u| u.recovery_token.clone()))
    }

    async fn recovery_holder(&self, token: &str) -> Result<Option<TokenHolder>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.holder_of(token, |u| {
            (u.recovery_token.as_deref(), u.recovery_issued_at)
        }))
    }

    async fn consume_recovery(
        &self,
        token: &str,
        not_before: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<UserId>, RepositoryError> {
        let mut tables = self.tables.write().await;
        let holder = tables.users.iter_mut().find(|(_, u)| {
            u.recovery_token.as_deref() == Some(token)
                && u.recovery_issued_at.is_some_and(|issued| issued >= not_before)
        });

        Ok(holder.map(|(id, user)| {
            password_hash.clone_into(&mut user.password_hash);
            user.recovery_token = None;
            user.recovery_issued_at = None;
            UserId::new(*id)
        }))
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_product(&self, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let product = Product {
            id: ProductId::new(id),
            name: draft.name().to_owned(),
            description: draft.description().map(str::to_owned),
            price: draft.price(),
            stock: draft.stock(),
            has_image: false,
        };
        tables.products.insert(
            id,
            ProductEntry {
                product: product.clone(),
                image: None,
            },
        );
        Ok(product)
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .get(&id.as_i64())
            .map(|entry| entry.product.clone()))
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .values()
            .map(|entry| entry.product.clone())
            .collect())
    }

    async fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut tables = self.tables.write().await;
        Ok(tables.products.get_mut(&id.as_i64()).map(|entry| {
            let product = &mut entry.product;
            draft.name().clone_into(&mut product.name);
            product.description = draft.description().map(str::to_owned);
            product.price = draft.price();
            product.stock = draft.stock();
            product.clone()
        }))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        Ok(self
            .tables
            .write()
            .await
            .products
            .remove(&id.as_i64())
            .is_some())
    }

    async fn product_image(&self, id: ProductId) -> Result<Option<Vec<u8>>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .get(&id.as_i64())
            .and_then(|entry| entry.image.clone()))
    }

    async fn set_product_image(
        &self,
        id: ProductId,
        image: Vec<u8>,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        let Some(entry) = tables.products.get_mut(&id.as_i64()) else {
            return Ok(false);
        };
        entry.image = Some(image);
        entry.product.has_image = true;
        Ok(true)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<Order, RepositoryError> {
        let mut tables = self.tables.write().await;
        let stored = tables.assign_ids(order, None);
        let id = stored
            .id()
            .ok_or_else(|| RepositoryError::DataCorruption("order without id".to_owned()))?;
        tables.orders.insert(id.as_i64(), stored.clone());
        Ok(stored)
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.tables.read().await.orders.get(&id.as_i64()).cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        Ok(self.tables.read().await.orders.values().cloned().collect())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .filter(|o| o.user_id() == user_id)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: OrderId,
        change: &StatusChange,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables.orders.get_mut(&id.as_i64()) else {
            return Ok(false);
        };
        if stored.status() != change.from {
            return Ok(false);
        }

        // Replaying the change reproduces the same delivery stamp.
        let stamp = change.delivered_at.unwrap_or_else(Utc::now);
        stored
            .change_status(change.to, stamp)
            .map_err(|e| RepositoryError::Conflict(e.to_string()))?;
        Ok(true)
    }

    async fn save_lines(&self, id: OrderId, order: &Order) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        let editable = tables
            .orders
            .get(&id.as_i64())
            .is_some_and(|o| o.status() == OrderStatus::EnPreparacion);
        if !editable {
            return Ok(false);
        }

        let stored = tables.assign_ids(order, Some(id));
        tables.orders.insert(id.as_i64(), stored);
        Ok(true)
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool, RepositoryError> {
        Ok(self
            .tables
            .write()
            .await
            .orders
            .remove(&id.as_i64())
            .is_some())
    }
}
