//! Product Model (inventory view)
//!
//! 商品的库存字段是订单核心唯一会修改的字段，其余 CRUD 由店铺后台负责。

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

pub const PRODUCT_TABLE: &str = "product";

/// Product model
///
/// Invariant: `stock` never goes negative. Every decrement goes through the
/// conditional update in `ProductRepository::reserve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: RecordId,
    pub store_id: String,
    pub name: String,
    pub price: Decimal,
    pub stock: i64,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreate {
    pub store_id: String,
    pub name: String,
    pub price: Decimal,
    pub stock: i64,
    #[serde(default)]
    pub category: String,
}
