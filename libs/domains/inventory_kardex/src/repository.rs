use async_trait::async_trait;
use uuid::Uuid;

use crate::error::KardexResult;
use crate::kardex::InventoryKardex;

/// Persistence boundary for inventory kardex records.
///
/// `save` persists a brand-new record; `update` replaces an existing one
/// and enforces optimistic concurrency on `version`, returning the stored
/// record with the incremented version.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryKardexRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> KardexResult<Option<InventoryKardex>>;

    async fn save(&self, kardex: InventoryKardex) -> KardexResult<InventoryKardex>;

    async fn update(&self, kardex: InventoryKardex) -> KardexResult<InventoryKardex>;

    async fn find_by_product_and_warehouse(
        &self,
        organization_id: &str,
        product_id: &str,
        warehouse_id: &str,
    ) -> KardexResult<Option<InventoryKardex>>;

    async fn find_by_product_and_location(
        &self,
        organization_id: &str,
        product_id: &str,
        location_id: &str,
    ) -> KardexResult<Option<InventoryKardex>>;
}
