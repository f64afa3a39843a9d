//! Discount Repository
//!
//! 消费折扣码用条件更新 + matched-count 判定，
//! 并发下同一 code 至多一个订单行能赢得消费权。

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{
    DiscountCode, DiscountCodeCast, DiscountCodeCastCreate, DiscountCodeCreate,
    discount::{DISCOUNT_CAST_TABLE, DISCOUNT_CODE_TABLE},
};
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

#[derive(Clone)]
pub struct DiscountRepository {
    base: BaseRepository,
}

impl DiscountRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Create a discount template (issuance is out of core scope; used by
    /// seeding and tests)
    pub async fn create_cast(&self, data: DiscountCodeCastCreate) -> RepoResult<DiscountCodeCast> {
        let cast: Option<DiscountCodeCast> =
            self.base.db().create(DISCOUNT_CAST_TABLE).content(data).await?;
        cast.ok_or_else(|| RepoError::Database("Create returned no discount cast".into()))
    }

    /// Create an issued code instance
    pub async fn create_code(&self, data: DiscountCodeCreate) -> RepoResult<DiscountCode> {
        let code: Option<DiscountCode> =
            self.base.db().create(DISCOUNT_CODE_TABLE).content(data).await?;
        code.ok_or_else(|| RepoError::Database("Create returned no discount code".into()))
    }

    /// Find an issued code by its unique code string
    pub async fn find_by_code(&self, code: &str) -> RepoResult<Option<DiscountCode>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM discount_code WHERE code = $code LIMIT 1")
            .bind(("code", code.to_string()))
            .await?;
        let codes: Vec<DiscountCode> = result.take(0)?;
        Ok(codes.into_iter().next())
    }

    /// Load the template a code was issued from
    pub async fn find_cast(&self, cast_id: &RecordId) -> RepoResult<Option<DiscountCodeCast>> {
        let cast: Option<DiscountCodeCast> = self.base.db().select(cast_id.clone()).await?;
        Ok(cast)
    }

    /// Atomically mark a code used.
    ///
    /// Returns `false` when the code was already used (including losing a
    /// concurrent race) — the check and the write are one conditional update.
    pub async fn consume(&self, code: &str) -> RepoResult<bool> {
        let mut result = self
            .base
            .db()
            .query("UPDATE discount_code SET is_used = true WHERE code = $code AND is_used = false RETURN AFTER")
            .bind(("code", code.to_string()))
            .await?;
        let updated: Vec<DiscountCode> = result.take(0)?;
        Ok(!updated.is_empty())
    }

    /// Un-consume a code (compensation path when a later line of the same
    /// order fails)
    pub async fn restore(&self, code: &str) -> RepoResult<()> {
        self.base
            .db()
            .query("UPDATE discount_code SET is_used = false WHERE code = $code")
            .bind(("code", code.to_string()))
            .await?;
        Ok(())
    }
}
