//! Order Repository
//!
//! 状态机的唯一写入口是 [`OrderRepository::transition`]：
//! from-状态集合 + 条件更新，客户取消和调度器的并发竞争至多一方生效。

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{Order, OrderCreate, OrderStatus, order::ORDER_TABLE};
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

#[derive(Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn create(&self, data: OrderCreate) -> RepoResult<Order> {
        let order: Option<Order> = self.base.db().create(ORDER_TABLE).content(data).await?;
        order.ok_or_else(|| RepoError::Database("Create returned no order".into()))
    }

    pub async fn find_by_id(&self, id: &RecordId) -> RepoResult<Option<Order>> {
        let order: Option<Order> = self.base.db().select(id.clone()).await?;
        Ok(order)
    }

    /// Find an order scoped to its owner.
    ///
    /// Ownership is enforced by the lookup filter, not by the HTTP layer: a
    /// wrong customer sees the same "not found" as a missing order.
    pub async fn find_for_customer(
        &self,
        id: &RecordId,
        customer_id: &str,
    ) -> RepoResult<Option<Order>> {
        // `order` clashes with the ORDER keyword, so the table goes through
        // type::table() in raw queries
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM type::table($tb) WHERE id = $order AND customer_id = $customer LIMIT 1")
            .bind(("tb", ORDER_TABLE))
            .bind(("order", id.clone()))
            .bind(("customer", customer_id.to_string()))
            .await?;
        let orders: Vec<Order> = result.take(0)?;
        Ok(orders.into_iter().next())
    }

    /// List a customer's orders, newest first
    pub async fn list_for_customer(&self, customer_id: &str) -> RepoResult<Vec<Order>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM type::table($tb) WHERE customer_id = $customer ORDER BY created_at DESC")
            .bind(("tb", ORDER_TABLE))
            .bind(("customer", customer_id.to_string()))
            .await?;
        let orders: Vec<Order> = result.take(0)?;
        Ok(orders)
    }

    /// Conditionally transition an order's status.
    ///
    /// Returns the updated order when the order was in one of the `from`
    /// states, `None` otherwise (already transitioned elsewhere, or missing).
    /// This is the guard that keeps terminal states terminal: a stale timer
    /// firing against a cancelled order matches nothing and becomes a no-op.
    pub async fn transition(
        &self,
        id: &RecordId,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> RepoResult<Option<Order>> {
        let mut result = self
            .base
            .db()
            .query("UPDATE $order SET order_status = $to WHERE order_status IN $from RETURN AFTER")
            .bind(("order", id.clone()))
            .bind(("to", to))
            .bind(("from", from.to_vec()))
            .await?;
        let orders: Vec<Order> = result.take(0)?;
        Ok(orders.into_iter().next())
    }
}
