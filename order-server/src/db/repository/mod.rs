//! Repository Module
//!
//! Provides CRUD and the atomic conditional updates the order core relies on.
//! All SurrealQL lives here; services never build queries themselves.

// Catalog
pub mod product;

// Discounts
pub mod discount;

// Orders
pub mod order;

// Shipments
pub mod shipment;

// Re-exports
pub use discount::DiscountRepository;
pub use order::OrderRepository;
pub use product::ProductRepository;
pub use shipment::ShipmentRepository;

use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};
use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<surrealdb::Error> for RepoError {
    fn from(err: surrealdb::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

// =============================================================================
// ID Convention: 全栈统一使用 "table:id" 格式
// =============================================================================
//
// API 层接收 "order:abc" 或裸 "abc"，统一通过 [`parse_record_id`] 转成
// RecordId 后再进入 repository。禁止在 repository 之外拼接 ID 字符串。

/// Parse an external id string into a [`RecordId`] for the given table.
///
/// Accepts both the full `table:key` form and the bare key.
pub fn parse_record_id(table: &str, id: &str) -> RepoResult<RecordId> {
    match id.split_once(':') {
        Some((tb, key)) if tb == table && !key.is_empty() => {
            Ok(RecordId::from_table_key(tb, key))
        }
        Some((tb, _)) => Err(RepoError::Validation(format!(
            "Expected {} id, got {}",
            table, tb
        ))),
        None if !id.is_empty() => Ok(RecordId::from_table_key(table, id)),
        None => Err(RepoError::Validation(format!("Empty {} id", table))),
    }
}

/// Base repository with database reference
#[derive(Clone)]
pub struct BaseRepository {
    db: Surreal<Db>,
}

impl BaseRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Surreal<Db> {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_form() {
        let id = parse_record_id("order", "order:abc123").unwrap();
        assert_eq!(id.table(), "order");
        assert_eq!(id.key().to_string(), "abc123");
    }

    #[test]
    fn test_parse_bare_key() {
        let id = parse_record_id("product", "p1").unwrap();
        assert_eq!(id.table(), "product");
    }

    #[test]
    fn test_parse_wrong_table() {
        assert!(parse_record_id("order", "product:p1").is_err());
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_record_id("order", "").is_err());
    }
}
