//! Order Model
//!
//! 订单是订单核心的聚合根。状态机见 [`OrderStatus`]，
//! 所有状态变更都走 `OrderRepository::transition` 的条件更新，
//! 保证终态（CONFIRMED / CANCELLED）不会被"复活"。

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

pub const ORDER_TABLE: &str = "order";

/// Order status enum
///
/// ```text
/// (create, cash)    -> PENDING ------------------ timer due --> CONFIRMED
/// (create, digital) -> WAITING_FOR_PAYMENT ------ paid -------> CONFIRMED
///                      |      |                   countdown due / customer
///                      +------+-----------------------------> CANCELLED
/// ```
///
/// CONFIRMED and CANCELLED are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    WaitingForPayment,
    Confirmed,
    Cancelled,
}

/// Payment method enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Digital,
}

/// One line of an order
///
/// Owned exclusively by its parent order; `line_id` is referenced by the
/// shipment created for this line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    /// Stable line identifier (UUID), referenced by shipments
    pub line_id: String,
    /// Record link to the product
    pub product: RecordId,
    pub quantity: u32,
    /// Extended line price (unit * quantity) after product discount
    pub price: Decimal,
    /// Shipping price after shipping discount
    pub shipping_price: Decimal,
    pub product_discount_code: Option<String>,
    pub shipping_discount_code: Option<String>,
}

/// Order entity
///
/// `total_price` is recomputed by the order service, never taken from client
/// input. Orders are never hard-deleted (shipment/audit trail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: RecordId,
    pub customer_id: String,
    /// Insertion order = line order, not reorderable
    pub items: Vec<OrderLine>,
    pub order_status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
    pub total_price: Decimal,
    /// Unix millis
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreate {
    pub customer_id: String,
    pub items: Vec<OrderLine>,
    pub order_status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
    pub total_price: Decimal,
    pub created_at: i64,
}
