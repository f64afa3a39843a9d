//! Product Repository
//!
//! 订单核心只关心库存字段。预留/释放都是单条条件更新，
//! 库存不足时并发请求至多一个能成功。

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{Product, ProductCreate, product::PRODUCT_TABLE};
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

#[derive(Clone)]
pub struct ProductRepository {
    base: BaseRepository,
}

impl ProductRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Create a product (used by seeding and tests; product CRUD itself is
    /// owned by the store backend, not the order core)
    pub async fn create(&self, data: ProductCreate) -> RepoResult<Product> {
        let product: Option<Product> = self.base.db().create(PRODUCT_TABLE).content(data).await?;
        product.ok_or_else(|| RepoError::Database("Create returned no product".into()))
    }

    pub async fn find_by_id(&self, id: &RecordId) -> RepoResult<Option<Product>> {
        let product: Option<Product> = self.base.db().select(id.clone()).await?;
        Ok(product)
    }

    /// Atomically reserve stock for an order line.
    ///
    /// Returns `false` when the product does not have `quantity` units left;
    /// nothing is mutated in that case. The decrement and the availability
    /// check are a single conditional update, so concurrent reservations
    /// cannot drive stock negative.
    pub async fn reserve(&self, id: &RecordId, quantity: u32) -> RepoResult<bool> {
        let mut result = self
            .base
            .db()
            .query("UPDATE $product SET stock -= $qty WHERE stock >= $qty RETURN AFTER")
            .bind(("product", id.clone()))
            .bind(("qty", i64::from(quantity)))
            .await?;
        let updated: Vec<Product> = result.take(0)?;
        Ok(!updated.is_empty())
    }

    /// Release previously reserved stock (unconditional atomic increment).
    ///
    /// Idempotency is the caller's responsibility: release exactly what was
    /// reserved, exactly once.
    pub async fn release(&self, id: &RecordId, quantity: u32) -> RepoResult<()> {
        let mut result = self
            .base
            .db()
            .query("UPDATE $product SET stock += $qty RETURN AFTER")
            .bind(("product", id.clone()))
            .bind(("qty", i64::from(quantity)))
            .await?;
        let updated: Vec<Product> = result.take(0)?;
        if updated.is_empty() {
            return Err(RepoError::NotFound(format!("Product {} not found", id)));
        }
        Ok(())
    }
}
