//! Shipment Model
//!
//! 订单确认后按订单行扇出，一行一条 shipment 记录。
//! delivery_company / delivery_personnel 由配送侧稍后指派。

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

pub const SHIPMENT_TABLE: &str = "shipment";

/// Shipment status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    Pending,
    Confirmed,
    Stored,
    Delivered,
    Failed,
}

/// Shipment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub id: RecordId,
    /// Record link to the parent order
    pub order: RecordId,
    /// `line_id` of the order line this shipment carries
    pub order_item_id: String,
    pub status: ShipmentStatus,
    /// Unix millis, created_at + configured offset (default 4 days)
    pub estimated_delivery: i64,
    pub delivery_company: Option<String>,
    pub delivery_personnel: Option<String>,
    pub canceller: Option<String>,
    /// Unix millis
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentCreate {
    pub order: RecordId,
    pub order_item_id: String,
    pub status: ShipmentStatus,
    pub estimated_delivery: i64,
    pub delivery_company: Option<String>,
    pub delivery_personnel: Option<String>,
    pub canceller: Option<String>,
    pub created_at: i64,
}
