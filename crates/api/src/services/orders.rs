//! Order workflow.
//!
//! Turns a user ID and a raw cart into a priced, persisted order, and governs
//! later changes to it. Prices are read from the catalog once, when the order
//! is placed, and copied into the lines.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use maxima_core::cart::{Cart, CartError, RawCart};
use maxima_core::order::{Order, OrderError, OrderLine};
use maxima_core::{OrderId, OrderLineId, OrderStatus, ProductId, UserId};

use crate::db::{AccountStore, CatalogStore, OrderStore, RepositoryError, Stores};

/// Errors raised by [`OrderWorkflow`].
#[derive(Debug, Error)]
pub enum OrderWorkflowError {
    /// The cart is empty or has an invalid entry.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The order aggregate rejected the operation.
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("order {order} has no line {line}")]
    LineNotFound { order: OrderId, line: OrderLineId },

    /// Another request changed the order between read and write.
    #[error("order {0} was modified by another request")]
    ConcurrentUpdate(OrderId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Order workflow over the account, catalog and order stores.
pub struct OrderWorkflow<'a> {
    accounts: &'a dyn AccountStore,
    catalog: &'a dyn CatalogStore,
    orders: &'a dyn OrderStore,
}

impl<'a> OrderWorkflow<'a> {
    #[must_use]
    pub fn new(stores: &'a Stores) -> Self {
        Self {
            accounts: stores.accounts.as_ref(),
            catalog: stores.catalog.as_ref(),
            orders: stores.orders.as_ref(),
        }
    }

    /// Place an order for `user_id` from a raw cart.
    ///
    /// Checks run in this order: empty cart, user, each cart entry, each
    /// product. Nothing is written unless every check passes, and the order
    /// is then written together with its lines in one atomic step.
    ///
    /// # Errors
    ///
    /// - [`OrderWorkflowError::Cart`] for an empty cart or a bad entry
    /// - [`OrderWorkflowError::UserNotFound`] / [`OrderWorkflowError::ProductNotFound`]
    /// - [`OrderWorkflowError::Repository`] if storage fails
    #[instrument(skip(self, raw_cart), fields(items = raw_cart.len()))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        raw_cart: &RawCart,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderWorkflowError> {
        if raw_cart.is_empty() {
            return Err(CartError::Empty.into());
        }

        if self.accounts.user_by_id(user_id).await?.is_none() {
            return Err(OrderWorkflowError::UserNotFound(user_id));
        }

        let cart = Cart::parse(raw_cart)?;

        let mut lines = Vec::with_capacity(cart.len());
        for item in cart.items() {
            let product = self
                .catalog
                .product(item.product_id)
                .await?
                .ok_or(OrderWorkflowError::ProductNotFound(item.product_id))?;

            lines.push(OrderLine::new(
                product.id,
                product.name,
                product.price,
                item.quantity,
            )?);
        }

        let order = Order::place(user_id, lines, now)?;
        let stored = self.orders.insert_order(&order).await?;

        tracing::info!(
            order_id = ?stored.id(),
            user_id = %user_id,
            total = %stored.total(),
            lines = stored.lines().len(),
            "Order created"
        );
        Ok(stored)
    }

    /// Move an order to `next`.
    ///
    /// # Errors
    ///
    /// - [`OrderWorkflowError::OrderNotFound`] if the order does not exist
    /// - [`OrderWorkflowError::Order`] with `AlreadyFinalized` if it is terminal
    /// - [`OrderWorkflowError::ConcurrentUpdate`] if its status changed meanwhile
    #[instrument(skip(self))]
    pub async fn change_status(
        &self,
        id: OrderId,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderWorkflowError> {
        let mut order = self.get(id).await?;
        let change = order.change_status(next, now)?;

        if !self.orders.update_status(id, &change).await? {
            return Err(OrderWorkflowError::ConcurrentUpdate(id));
        }

        tracing::info!(order_id = %id, from = %change.from, to = %change.to, "Order status changed");
        Ok(order)
    }

    /// Remove one line from an order that is still being prepared.
    ///
    /// # Errors
    ///
    /// - [`OrderWorkflowError::OrderNotFound`] / [`OrderWorkflowError::LineNotFound`]
    /// - [`OrderWorkflowError::Order`] if the order is locked or the line is its last
    /// - [`OrderWorkflowError::ConcurrentUpdate`] if the order left preparation meanwhile
    #[instrument(skip(self))]
    pub async fn remove_line(
        &self,
        id: OrderId,
        line_id: OrderLineId,
    ) -> Result<Order, OrderWorkflowError> {
        let mut order = self.get(id).await?;
        let index = order
            .lines()
            .iter()
            .position(|line| line.id() == Some(line_id))
            .ok_or(OrderWorkflowError::LineNotFound {
                order: id,
                line: line_id,
            })?;

        order.remove_line(index)?;

        if !self.orders.save_lines(id, &order).await? {
            return Err(OrderWorkflowError::ConcurrentUpdate(id));
        }

        tracing::info!(order_id = %id, line_id = %line_id, total = %order.total(), "Order line removed");
        Ok(order)
    }

    /// Fetch one order with its lines.
    ///
    /// # Errors
    ///
    /// Returns [`OrderWorkflowError::OrderNotFound`] if it does not exist.
    pub async fn get(&self, id: OrderId) -> Result<Order, OrderWorkflowError> {
        self.orders
            .order(id)
            .await?
            .ok_or(OrderWorkflowError::OrderNotFound(id))
    }

    /// Every order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`OrderWorkflowError::Repository`] if storage fails.
    pub async fn list_all(&self) -> Result<Vec<Order>, OrderWorkflowError> {
        Ok(self.orders.list_orders().await?)
    }

    /// Orders placed by `user_id`. Empty if the user has none or does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`OrderWorkflowError::Repository`] if storage fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, OrderWorkflowError> {
        Ok(self.orders.orders_for_user(user_id).await?)
    }

    /// Delete an order and its lines.
    ///
    /// # Errors
    ///
    /// Returns [`OrderWorkflowError::OrderNotFound`] if it does not exist.
    pub async fn delete(&self, id: OrderId) -> Result<(), OrderWorkflowError> {
        if !self.orders.delete_order(id).await? {
            return Err(OrderWorkflowError::OrderNotFound(id));
        }
        tracing::info!(order_id = %id, "Order deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;
    use tokio::task::JoinSet;

    use maxima_core::account::ActivationTicket;
    use maxima_core::product::ProductDraft;
    use maxima_core::{Email, UserRole};

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{NewUser, Profile};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    struct Fixture {
        memory: MemoryStore,
        stores: Stores,
        user: UserId,
        box_product: ProductId,
        tape_product: ProductId,
    }

    async fn fixture() -> Fixture {
        let memory = MemoryStore::new();
        let stores = Stores::memory(&memory);

        let user = stores
            .accounts
            .insert_user(NewUser {
                profile: Profile::default(),
                email: Email::parse("pedidos@maximacarga.es").unwrap(),
                role: UserRole::parse("cliente").unwrap(),
                password_hash: "hash".to_owned(),
                activation: ActivationTicket::issue(now(), Duration::hours(24)),
            })
            .await
            .unwrap()
            .id;

        let draft = |name: &str, cents: i64| {
            ProductDraft::new(Some(name), None, Some(Decimal::new(cents, 2)), Some(50)).unwrap()
        };
        let box_product = stores
            .catalog
            .insert_product(&draft("Caja", 1000))
            .await
            .unwrap()
            .id;
        let tape_product = stores
            .catalog
            .insert_product(&draft("Cinta", 350))
            .await
            .unwrap()
            .id;

        Fixture {
            memory,
            stores,
            user,
            box_product,
            tape_product,
        }
    }

    fn cart(entries: &[(ProductId, Option<i64>)]) -> RawCart {
        entries
            .iter()
            .map(|(id, qty)| (id.to_string(), *qty))
            .collect()
    }

    #[tokio::test]
    async fn test_create_order_prices_lines_from_catalog() {
        let f = fixture().await;
        let workflow = OrderWorkflow::new(&f.stores);

        let raw = cart(&[(f.box_product, Some(2)), (f.tape_product, Some(1))]);
        let order = workflow.create_order(f.user, &raw, now()).await.unwrap();

        assert!(order.id().is_some());
        assert_eq!(order.total(), Decimal::new(2350, 2));
        assert_eq!(order.subtotal(), order.total());
        assert_eq!(order.lines().len(), 2);
        assert_eq!(order.lines()[0].subtotal(), Decimal::new(2000, 2));
        assert_eq!(order.lines()[1].subtotal(), Decimal::new(350, 2));
        assert_eq!(order.status(), OrderStatus::EnPreparacion);
        assert_eq!(order.created_at(), now());
        assert!(order.lines().iter().all(|l| l.id().is_some()));
    }

    #[tokio::test]
    async fn test_later_price_change_does_not_touch_placed_order() {
        let f = fixture().await;
        let workflow = OrderWorkflow::new(&f.stores);
        let order = workflow
            .create_order(f.user, &cart(&[(f.box_product, Some(1))]), now())
            .await
            .unwrap();

        let pricier =
            ProductDraft::new(Some("Caja"), None, Some(Decimal::new(9900, 2)), Some(5)).unwrap();
        f.stores
            .catalog
            .update_product(f.box_product, &pricier)
            .await
            .unwrap();

        let reloaded = workflow.get(order.id().unwrap()).await.unwrap();
        assert_eq!(reloaded.total(), Decimal::new(1000, 2));
        assert_eq!(reloaded.lines()[0].unit_price(), Decimal::new(1000, 2));
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected_before_user_lookup() {
        let f = fixture().await;
        let workflow = OrderWorkflow::new(&f.stores);

        let err = workflow
            .create_order(UserId::new(999), &RawCart::new(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderWorkflowError::Cart(CartError::Empty)));
        assert_eq!(f.memory.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let f = fixture().await;
        let workflow = OrderWorkflow::new(&f.stores);

        let err = workflow
            .create_order(UserId::new(999), &cart(&[(f.box_product, Some(1))]), now())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderWorkflowError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn test_bad_quantity_is_validation_error() {
        let f = fixture().await;
        let workflow = OrderWorkflow::new(&f.stores);

        for qty in [None, Some(0), Some(-1)] {
            let err = workflow
                .create_order(f.user, &cart(&[(f.box_product, qty)]), now())
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                OrderWorkflowError::Cart(CartError::InvalidQuantity(_))
            ));
        }
        assert_eq!(f.memory.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_product_leaves_nothing_behind() {
        let f = fixture().await;
        let workflow = OrderWorkflow::new(&f.stores);

        let raw = cart(&[(f.box_product, Some(1)), (ProductId::new(4040), Some(1))]);
        let err = workflow.create_order(f.user, &raw, now()).await.unwrap_err();
        assert!(matches!(
            err,
            OrderWorkflowError::ProductNotFound(id) if id == ProductId::new(4040)
        ));
        assert_eq!(f.memory.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_terminal_status_rejects_changes_and_keeps_state() {
        let f = fixture().await;
        let workflow = OrderWorkflow::new(&f.stores);
        let order = workflow
            .create_order(f.user, &cart(&[(f.box_product, Some(1))]), now())
            .await
            .unwrap();
        let id = order.id().unwrap();

        let delivered_at = now() + Duration::days(2);
        let delivered = workflow
            .change_status(id, OrderStatus::Entregado, delivered_at)
            .await
            .unwrap();
        assert_eq!(delivered.delivered_at(), Some(delivered_at));

        for next in OrderStatus::ALL {
            let err = workflow
                .change_status(id, next, now() + Duration::days(5))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                OrderWorkflowError::Order(OrderError::AlreadyFinalized(OrderStatus::Entregado))
            ));
        }

        let stored = workflow.get(id).await.unwrap();
        assert_eq!(stored.status(), OrderStatus::Entregado);
        assert_eq!(stored.delivered_at(), Some(delivered_at));
    }

    #[tokio::test]
    async fn test_shipping_does_not_stamp_delivery() {
        let f = fixture().await;
        let workflow = OrderWorkflow::new(&f.stores);
        let order = workflow
            .create_order(f.user, &cart(&[(f.tape_product, Some(3))]), now())
            .await
            .unwrap();

        let shipped = workflow
            .change_status(order.id().unwrap(), OrderStatus::Enviado, now())
            .await
            .unwrap();
        assert_eq!(shipped.status(), OrderStatus::Enviado);
        assert_eq!(shipped.delivered_at(), None);
    }

    #[tokio::test]
    async fn test_change_status_of_missing_order() {
        let f = fixture().await;
        let workflow = OrderWorkflow::new(&f.stores);
        let err = workflow
            .change_status(OrderId::new(77), OrderStatus::Enviado, now())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderWorkflowError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_line_persists_new_totals() {
        let f = fixture().await;
        let workflow = OrderWorkflow::new(&f.stores);
        let raw = cart(&[(f.box_product, Some(2)), (f.tape_product, Some(1))]);
        let order = workflow.create_order(f.user, &raw, now()).await.unwrap();
        let id = order.id().unwrap();
        let box_line = order.lines()[0].id().unwrap();

        let updated = workflow.remove_line(id, box_line).await.unwrap();
        assert_eq!(updated.total(), Decimal::new(350, 2));

        let stored = workflow.get(id).await.unwrap();
        assert_eq!(stored.lines().len(), 1);
        assert_eq!(stored.total(), Decimal::new(350, 2));

        let last = stored.lines()[0].id().unwrap();
        let err = workflow.remove_line(id, last).await.unwrap_err();
        assert!(matches!(err, OrderWorkflowError::Order(OrderError::NoLines)));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let f = fixture().await;
        let workflow = OrderWorkflow::new(&f.stores);
        let order = workflow
            .create_order(f.user, &cart(&[(f.box_product, Some(1))]), now())
            .await
            .unwrap();
        let id = order.id().unwrap();

        assert_eq!(workflow.list_all().await.unwrap().len(), 1);
        assert_eq!(workflow.list_for_user(f.user).await.unwrap().len(), 1);
        assert!(workflow.list_for_user(UserId::new(555)).await.unwrap().is_empty());

        workflow.delete(id).await.unwrap();
        assert!(matches!(
            workflow.delete(id).await.unwrap_err(),
            OrderWorkflowError::OrderNotFound(_)
        ));
        assert!(matches!(
            workflow.get(id).await.unwrap_err(),
            OrderWorkflowError::OrderNotFound(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_final_statuses_apply_once() {
        let f = fixture().await;
        let order = OrderWorkflow::new(&f.stores)
            .create_order(f.user, &cart(&[(f.box_product, Some(1))]), now())
            .await
            .unwrap();
        let id = order.id().unwrap();

        let mut tasks = JoinSet::new();
        for next in [OrderStatus::Entregado, OrderStatus::Cancelado] {
            let stores = f.stores.clone();
            tasks.spawn(async move {
                let result = OrderWorkflow::new(&stores)
                    .change_status(id, next, now() + Duration::days(1))
                    .await;
                (next, result)
            });
        }

        let mut applied = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined.unwrap() {
                (next, Ok(order)) => {
                    assert_eq!(order.status(), next);
                    applied.push(next);
                }
                (_, Err(e)) => assert!(
                    matches!(
                        e,
                        OrderWorkflowError::ConcurrentUpdate(_)
                            | OrderWorkflowError::Order(OrderError::AlreadyFinalized(_))
                    ),
                    "{e}"
                ),
            }
        }
        assert_eq!(applied.len(), 1);

        let stored = OrderWorkflow::new(&f.stores).get(id).await.unwrap();
        assert_eq!(stored.status(), applied[0]);
    }
}
