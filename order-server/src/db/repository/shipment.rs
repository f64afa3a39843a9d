//! Shipment Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{Shipment, ShipmentCreate, shipment::SHIPMENT_TABLE};
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

#[derive(Clone)]
pub struct ShipmentRepository {
    base: BaseRepository,
}

impl ShipmentRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn create(&self, data: ShipmentCreate) -> RepoResult<Shipment> {
        let shipment: Option<Shipment> =
            self.base.db().create(SHIPMENT_TABLE).content(data).await?;
        shipment.ok_or_else(|| RepoError::Database("Create returned no shipment".into()))
    }

    /// All shipments fanned out for an order
    pub async fn list_for_order(&self, order_id: &RecordId) -> RepoResult<Vec<Shipment>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM shipment WHERE order = $order")
            .bind(("order", order_id.clone()))
            .await?;
        let shipments: Vec<Shipment> = result.take(0)?;
        Ok(shipments)
    }
}
