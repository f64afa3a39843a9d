//! Database Module
//!
//! 嵌入式 SurrealDB (RocksDB 引擎)。连接在进程启动时显式构造，
//! 作为依赖注入传给各服务，不使用全局单例。

pub mod models;
pub mod repository;

use std::path::Path;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, RocksDb};

const NAMESPACE: &str = "marketplace";
const DATABASE: &str = "orders";

/// Open the embedded database at `path` and select namespace/database.
pub async fn init_db(path: &Path) -> anyhow::Result<Surreal<Db>> {
    let db = Surreal::new::<RocksDb>(path).await?;
    db.use_ns(NAMESPACE).use_db(DATABASE).await?;
    tracing::info!(path = %path.display(), "Database initialized");
    Ok(db)
}
