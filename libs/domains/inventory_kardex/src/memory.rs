use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{KardexError, KardexResult};
use crate::kardex::InventoryKardex;
use crate::repository::InventoryKardexRepository;

/// In-memory repository backed by a `RwLock`ed map.
///
/// Used by tests and local tooling; `update` performs the same
/// compare-and-swap on `version` a database implementation would.
#[derive(Debug, Default)]
pub struct InMemoryKardexRepository {
    store: RwLock<HashMap<Uuid, InventoryKardex>>,
}

impl InMemoryKardexRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryKardexRepository for InMemoryKardexRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> KardexResult<Option<InventoryKardex>> {
        let store = self.store.read().await;
        Ok(store.get(&id).cloned())
    }

    #[instrument(skip(self, kardex), fields(kardex_id = %kardex.id))]
    async fn save(&self, kardex: InventoryKardex) -> KardexResult<InventoryKardex> {
        let mut store = self.store.write().await;
        if store.contains_key(&kardex.id) {
            return Err(KardexError::Conflict(format!(
                "Inventory kardex {} already exists",
                kardex.id
            )));
        }
        tracing::info!(kardex_id = %kardex.id, "Saving inventory kardex");
        store.insert(kardex.id, kardex.clone());
        Ok(kardex)
    }

    #[instrument(skip(self, kardex), fields(kardex_id = %kardex.id))]
    async fn update(&self, mut kardex: InventoryKardex) -> KardexResult<InventoryKardex> {
        let mut store = self.store.write().await;
        let stored = store
            .get(&kardex.id)
            .ok_or(KardexError::NotFound(kardex.id))?;
        if stored.version != kardex.version {
            return Err(KardexError::Conflict(format!(
                "Stale write for inventory kardex {}: expected version {}, got {}",
                kardex.id, stored.version, kardex.version
            )));
        }
        kardex.version += 1;
        tracing::info!(kardex_id = %kardex.id, version = kardex.version, "Updating inventory kardex");
        store.insert(kardex.id, kardex.clone());
        Ok(kardex)
    }

    #[instrument(skip(self))]
    async fn find_by_product_and_warehouse(
        &self,
        organization_id: &str,
        product_id: &str,
        warehouse_id: &str,
    ) -> KardexResult<Option<InventoryKardex>> {
        let store = self.store.read().await;
        Ok(store
            .values()
            .find(|k| {
                k.organization_id == organization_id
                    && k.product_id == product_id
                    && k.warehouse_id.as_deref() == Some(warehouse_id)
            })
            .cloned())
    }

    #[instrument(skip(self))]
    async fn find_by_product_and_location(
        &self,
        organization_id: &str,
        product_id: &str,
        location_id: &str,
    ) -> KardexResult<Option<InventoryKardex>> {
        let store = self.store.read().await;
        Ok(store
            .values()
            .find(|k| {
                k.organization_id == organization_id
                    && k.product_id == product_id
                    && k.location_id.as_deref() == Some(location_id)
            })
            .cloned())
    }
}
