//! Shipment Fan-out
//!
//! 订单进入 CONFIRMED 后按行扇出 shipment 记录，一行一条。
//! 纯新增操作：中途失败允许部分创建，不回滚（重复确认被状态机挡住）。

use crate::db::models::{Order, Shipment, ShipmentCreate, ShipmentStatus, order::ORDER_TABLE};
use crate::db::repository::{OrderRepository, ShipmentRepository, parse_record_id};
use crate::orders::error::OrderError;
use crate::utils::time;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

#[derive(Clone)]
pub struct ShipmentService {
    db: Surreal<Db>,
    /// Days between confirmation and estimated delivery
    delivery_offset_days: u32,
}

impl ShipmentService {
    pub fn new(db: Surreal<Db>, delivery_offset_days: u32) -> Self {
        Self {
            db,
            delivery_offset_days,
        }
    }

    /// Create one pending shipment per order line.
    ///
    /// Returns the shipments created so far even on a mid-loop persistence
    /// error (partial creation is acceptable, the step is purely additive).
    pub async fn create_for_order(&self, order: &Order) -> Result<Vec<Shipment>, OrderError> {
        let repo = ShipmentRepository::new(self.db.clone());
        let now = time::now_millis();
        let estimated_delivery = time::millis_after_days(self.delivery_offset_days);

        let mut created = Vec::with_capacity(order.items.len());
        for line in &order.items {
            let shipment = repo
                .create(ShipmentCreate {
                    order: order.id.clone(),
                    order_item_id: line.line_id.clone(),
                    status: ShipmentStatus::Pending,
                    estimated_delivery,
                    delivery_company: None,
                    delivery_personnel: None,
                    canceller: None,
                    created_at: now,
                })
                .await?;
            created.push(shipment);
        }

        tracing::info!(
            order_id = %order.id,
            shipments = created.len(),
            "Shipments created for confirmed order"
        );
        Ok(created)
    }

    /// Fan out shipments for an order looked up by id
    pub async fn create_for_order_id(&self, order_id: &str) -> Result<Vec<Shipment>, OrderError> {
        let oid = parse_record_id(ORDER_TABLE, order_id)
            .map_err(|_| OrderError::NotFound(format!("Order {}", order_id)))?;
        let order = OrderRepository::new(self.db.clone())
            .find_by_id(&oid)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("Order {}", order_id)))?;
        self.create_for_order(&order).await
    }
}
