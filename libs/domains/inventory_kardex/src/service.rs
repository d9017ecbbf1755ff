use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::error::{KardexError, KardexResult};
use crate::kardex::InventoryKardex;
use crate::models::{
    CreateInventoryKardex, Money, Movement, MovementType, RecordMovement, UpdateInventoryKardex,
};
use crate::repository::InventoryKardexRepository;

/// Outcome of recording a movement: the updated record plus the movement
/// appended to its history.
#[derive(Debug, Clone)]
pub struct MovementRecorded {
    pub kardex: InventoryKardex,
    pub movement: Movement,
}

/// Use-case layer over an [`InventoryKardexRepository`].
pub struct InventoryKardexService<R: InventoryKardexRepository> {
    repository: Arc<R>,
}

impl<R: InventoryKardexRepository> Clone for InventoryKardexService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: InventoryKardexRepository> InventoryKardexService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Create a kardex, enforcing uniqueness of (organization, product,
    /// warehouse) and (organization, product, location).
    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn create_kardex(
        &self,
        input: CreateInventoryKardex,
    ) -> KardexResult<InventoryKardex> {
        input
            .validate()
            .map_err(|e| KardexError::Validation(e.to_string()))?;

        if let Some(warehouse_id) = input.warehouse_id.as_deref() {
            if self
                .repository
                .find_by_product_and_warehouse(&input.organization_id, &input.product_id, warehouse_id)
                .await?
                .is_some()
            {
                return Err(KardexError::Conflict(format!(
                    "Inventory kardex for product '{}' already exists in warehouse '{}'",
                    input.product_id, warehouse_id
                )));
            }
        }
        if let Some(location_id) = input.location_id.as_deref() {
            if self
                .repository
                .find_by_product_and_location(&input.organization_id, &input.product_id, location_id)
                .await?
                .is_some()
            {
                return Err(KardexError::Conflict(format!(
                    "Inventory kardex for product '{}' already exists at location '{}'",
                    input.product_id, location_id
                )));
            }
        }

        let kardex = InventoryKardex::new(input)?;
        if !kardex.validate() {
            return Err(KardexError::InvalidState(kardex.id));
        }

        let saved = self.repository.save(kardex).await?;
        tracing::info!(kardex_id = %saved.id, "Created inventory kardex");
        Ok(saved)
    }

    /// Record a movement against an existing kardex and persist the result.
    #[instrument(skip(self, input), fields(kardex_id = %input.inventory_kardex_id))]
    pub async fn record_movement(&self, input: RecordMovement) -> KardexResult<MovementRecorded> {
        input
            .validate()
            .map_err(|e| KardexError::Validation(e.to_string()))?;
        if input.quantity <= 0.0 {
            return Err(KardexError::Validation(
                "Movement quantity must be positive".to_string(),
            ));
        }

        let mut kardex = self
            .repository
            .find_by_id(input.inventory_kardex_id)
            .await?
            .ok_or(KardexError::NotFound(input.inventory_kardex_id))?;

        match input.movement_type {
            MovementType::In => {
                let unit_cost = Self::require_unit_cost(&input)?;
                kardex.record_in_movement(
                    input.movement_reason,
                    input.quantity,
                    unit_cost,
                    input.details,
                )?;
            }
            MovementType::Out => {
                if input.quantity > kardex.available_quantity
                    && !kardex.settings.allow_negative_stock
                {
                    return Err(KardexError::InsufficientStock {
                        requested: input.quantity,
                        available: kardex.available_quantity,
                    });
                }
                kardex.record_out_movement(
                    input.movement_reason,
                    input.quantity,
                    input.details,
                )?;
            }
            MovementType::Transfer => {
                if input.to_warehouse_id.is_none() && input.to_location_id.is_none() {
                    return Err(KardexError::Validation(
                        "Transfer movements require a destination warehouse or location"
                            .to_string(),
                    ));
                }
                // Transfers never draw stock negative, even when the
                // negative-stock setting is on.
                if input.quantity > kardex.available_quantity {
                    return Err(KardexError::InsufficientStock {
                        requested: input.quantity,
                        available: kardex.available_quantity,
                    });
                }
                kardex.record_transfer_movement(input.quantity, input.details)?;
            }
            MovementType::Adjustment => {
                let unit_cost = Self::require_unit_cost(&input)?;
                kardex.record_adjustment_movement(
                    input.movement_reason,
                    input.quantity,
                    unit_cost,
                    input.details,
                )?;
            }
            other => {
                return Err(KardexError::UnsupportedMovementType(other.to_string()));
            }
        }

        if !kardex.validate() {
            return Err(KardexError::InvalidState(kardex.id));
        }

        let movement = kardex
            .movements
            .last()
            .cloned()
            .ok_or(KardexError::InvalidState(kardex.id))?;
        let updated = self.repository.update(kardex).await?;
        tracing::info!(
            kardex_id = %updated.id,
            movement_id = %movement.id,
            movement_type = %movement.movement_type,
            "Recorded inventory movement"
        );
        Ok(MovementRecorded {
            kardex: updated,
            movement,
        })
    }

    /// Relocate a kardex and/or patch its settings.
    #[instrument(skip(self, input))]
    pub async fn update_kardex(
        &self,
        id: Uuid,
        input: UpdateInventoryKardex,
    ) -> KardexResult<InventoryKardex> {
        input
            .validate()
            .map_err(|e| KardexError::Validation(e.to_string()))?;

        let mut kardex = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(KardexError::NotFound(id))?;

        if let Some(warehouse_id) = input.warehouse_id.as_deref() {
            if kardex.warehouse_id.as_deref() != Some(warehouse_id) {
                if let Some(existing) = self
                    .repository
                    .find_by_product_and_warehouse(
                        &kardex.organization_id,
                        &kardex.product_id,
                        warehouse_id,
                    )
                    .await?
                {
                    if existing.id != id {
                        return Err(KardexError::Conflict(format!(
                            "Inventory kardex for product '{}' already exists in warehouse '{}'",
                            kardex.product_id, warehouse_id
                        )));
                    }
                }
            }
        }
        if let Some(location_id) = input.location_id.as_deref() {
            if kardex.location_id.as_deref() != Some(location_id) {
                if let Some(existing) = self
                    .repository
                    .find_by_product_and_location(
                        &kardex.organization_id,
                        &kardex.product_id,
                        location_id,
                    )
                    .await?
                {
                    if existing.id != id {
                        return Err(KardexError::Conflict(format!(
                            "Inventory kardex for product '{}' already exists at location '{}'",
                            kardex.product_id, location_id
                        )));
                    }
                }
            }
        }

        kardex.apply_update(input);
        if !kardex.validate() {
            return Err(KardexError::InvalidState(kardex.id));
        }

        let updated = self.repository.update(kardex).await?;
        tracing::info!(kardex_id = %updated.id, "Updated inventory kardex");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn get_kardex(&self, id: Uuid) -> KardexResult<InventoryKardex> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(KardexError::NotFound(id))
    }

    fn require_unit_cost(input: &RecordMovement) -> KardexResult<Money> {
        let cost = input.unit_cost.as_ref().ok_or_else(|| {
            KardexError::Validation(format!(
                "Movement type '{}' requires a unit cost",
                input.movement_type
            ))
        })?;
        Money::new(cost.amount, &cost.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InventorySettings, MovementDetails, MovementReason};
    use crate::repository::MockInventoryKardexRepository;

    fn create_input() -> CreateInventoryKardex {
        CreateInventoryKardex {
            organization_id: "org-1".to_string(),
            product_id: "prod-1".to_string(),
            warehouse_id: Some("wh-1".to_string()),
            location_id: None,
            initial_quantity: 100.0,
            unit_cost: Money::new(10.0, "USD").unwrap(),
            settings: InventorySettings::default(),
        }
    }

    fn stored_kardex() -> InventoryKardex {
        InventoryKardex::new(create_input()).unwrap()
    }

    fn record_input(id: Uuid, movement_type: MovementType, quantity: f64) -> RecordMovement {
        RecordMovement {
            inventory_kardex_id: id,
            movement_type,
            movement_reason: MovementReason::Other,
            quantity,
            unit_cost: Some(Money::new(10.0, "USD").unwrap()),
            to_warehouse_id: None,
            to_location_id: None,
            details: MovementDetails::default(),
        }
    }

    #[tokio::test]
    async fn create_kardex_saves_when_scope_is_free() {
        let mut repo = MockInventoryKardexRepository::new();
        repo.expect_find_by_product_and_warehouse()
            .times(1)
            .returning(|_, _, _| Ok(None));
        repo.expect_save().times(1).returning(Ok);

        let service = InventoryKardexService::new(Arc::new(repo));
        let created = service.create_kardex(create_input()).await.unwrap();

        assert_eq!(created.product_id, "prod-1");
        assert_eq!(created.current_quantity, 100.0);
        assert_eq!(created.version, 0);
    }

    #[tokio::test]
    async fn create_kardex_rejects_duplicate_warehouse_scope() {
        let mut repo = MockInventoryKardexRepository::new();
        repo.expect_find_by_product_and_warehouse()
            .times(1)
            .returning(|_, _, _| Ok(Some(stored_kardex())));
        repo.expect_save().times(0);

        let service = InventoryKardexService::new(Arc::new(repo));
        let err = service.create_kardex(create_input()).await.unwrap_err();
        assert!(matches!(err, KardexError::Conflict(_)));
    }

    #[tokio::test]
    async fn create_kardex_rejects_invalid_input() {
        let repo = MockInventoryKardexRepository::new();
        let service = InventoryKardexService::new(Arc::new(repo));

        let mut input = create_input();
        input.product_id = String::new();
        let err = service.create_kardex(input).await.unwrap_err();
        assert!(matches!(err, KardexError::Validation(_)));

        let mut input = create_input();
        input.initial_quantity = -5.0;
        let err = service.create_kardex(input).await.unwrap_err();
        assert!(matches!(err, KardexError::Validation(_)));
    }

    #[tokio::test]
    async fn record_in_movement_persists_updated_kardex() {
        let stored = stored_kardex();
        let id = stored.id;

        let mut repo = MockInventoryKardexRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        repo.expect_update().times(1).returning(Ok);

        let service = InventoryKardexService::new(Arc::new(repo));
        let result = service
            .record_movement(record_input(id, MovementType::In, 50.0))
            .await
            .unwrap();

        assert_eq!(result.kardex.current_quantity, 150.0);
        assert_eq!(result.movement.quantity, 50.0);
        assert_eq!(result.movement.movement_type, MovementType::In);
    }

    #[tokio::test]
    async fn record_in_movement_requires_unit_cost() {
        let stored = stored_kardex();
        let id = stored.id;

        let mut repo = MockInventoryKardexRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        repo.expect_update().times(0);

        let service = InventoryKardexService::new(Arc::new(repo));
        let mut input = record_input(id, MovementType::In, 50.0);
        input.unit_cost = None;
        let err = service.record_movement(input).await.unwrap_err();
        assert!(matches!(err, KardexError::Validation(_)));
    }

    #[tokio::test]
    async fn record_out_movement_insufficient_stock_skips_update() {
        let stored = stored_kardex();
        let id = stored.id;

        let mut repo = MockInventoryKardexRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        repo.expect_update().times(0);

        let service = InventoryKardexService::new(Arc::new(repo));
        let err = service
            .record_movement(record_input(id, MovementType::Out, 150.0))
            .await
            .unwrap_err();
        assert!(matches!(err, KardexError::InsufficientStock { .. }));
    }

    #[tokio::test]
    async fn record_out_movement_allows_negative_stock_when_enabled() {
        let mut stored = stored_kardex();
        stored.settings.allow_negative_stock = true;
        let id = stored.id;

        let mut repo = MockInventoryKardexRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        repo.expect_update().times(1).returning(Ok);

        let service = InventoryKardexService::new(Arc::new(repo));
        let result = service
            .record_movement(record_input(id, MovementType::Out, 150.0))
            .await
            .unwrap();
        assert_eq!(result.kardex.current_quantity, -50.0);
    }

    #[tokio::test]
    async fn record_transfer_insufficient_stock_even_with_negative_stock_enabled() {
        let mut stored = stored_kardex();
        stored.settings.allow_negative_stock = true;
        let id = stored.id;

        let mut repo = MockInventoryKardexRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        repo.expect_update().times(0);

        let service = InventoryKardexService::new(Arc::new(repo));
        let mut input = record_input(id, MovementType::Transfer, 150.0);
        input.to_warehouse_id = Some("wh-2".to_string());
        let err = service.record_movement(input).await.unwrap_err();
        assert!(matches!(
            err,
            KardexError::InsufficientStock { requested, available }
                if requested == 150.0 && available == 100.0
        ));
    }

    #[tokio::test]
    async fn record_transfer_requires_destination() {
        let stored = stored_kardex();
        let id = stored.id;

        let mut repo = MockInventoryKardexRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        repo.expect_update().times(0);

        let service = InventoryKardexService::new(Arc::new(repo));
        let err = service
            .record_movement(record_input(id, MovementType::Transfer, 10.0))
            .await
            .unwrap_err();
        assert!(matches!(err, KardexError::Validation(_)));
    }

    #[tokio::test]
    async fn record_transfer_with_destination_succeeds() {
        let stored = stored_kardex();
        let id = stored.id;

        let mut repo = MockInventoryKardexRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        repo.expect_update().times(1).returning(Ok);

        let service = InventoryKardexService::new(Arc::new(repo));
        let mut input = record_input(id, MovementType::Transfer, 10.0);
        input.to_warehouse_id = Some("wh-2".to_string());
        let result = service.record_movement(input).await.unwrap();

        assert_eq!(result.movement.quantity, -10.0);
        assert_eq!(result.kardex.current_quantity, 90.0);
    }

    #[tokio::test]
    async fn record_movement_rejects_unsupported_type() {
        let stored = stored_kardex();
        let id = stored.id;

        let mut repo = MockInventoryKardexRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        repo.expect_update().times(0);

        let service = InventoryKardexService::new(Arc::new(repo));
        let err = service
            .record_movement(record_input(id, MovementType::Damage, 5.0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KardexError::UnsupportedMovementType(t) if t == "damage"
        ));
    }

    #[tokio::test]
    async fn record_movement_rejects_zero_quantity() {
        let repo = MockInventoryKardexRepository::new();
        let service = InventoryKardexService::new(Arc::new(repo));
        let err = service
            .record_movement(record_input(Uuid::now_v7(), MovementType::In, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, KardexError::Validation(_)));
    }

    #[tokio::test]
    async fn record_movement_unknown_kardex_is_not_found() {
        let mut repo = MockInventoryKardexRepository::new();
        repo.expect_find_by_id().times(1).returning(|_| Ok(None));

        let service = InventoryKardexService::new(Arc::new(repo));
        let err = service
            .record_movement(record_input(Uuid::now_v7(), MovementType::In, 5.0))
            .await
            .unwrap_err();
        assert!(matches!(err, KardexError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_kardex_checks_target_warehouse_uniqueness() {
        let stored = stored_kardex();
        let id = stored.id;
        let occupant = stored_kardex();

        let mut repo = MockInventoryKardexRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        repo.expect_find_by_product_and_warehouse()
            .times(1)
            .returning(move |_, _, _| Ok(Some(occupant.clone())));
        repo.expect_update().times(0);

        let service = InventoryKardexService::new(Arc::new(repo));
        let err = service
            .update_kardex(
                id,
                UpdateInventoryKardex {
                    warehouse_id: Some("wh-2".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, KardexError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_kardex_applies_settings_patch() {
        let stored = stored_kardex();
        let id = stored.id;

        let mut repo = MockInventoryKardexRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        repo.expect_update().times(1).returning(Ok);

        let service = InventoryKardexService::new(Arc::new(repo));
        let updated = service
            .update_kardex(
                id,
                UpdateInventoryKardex {
                    settings: Some(crate::models::SettingsPatch {
                        low_stock_threshold: Some(20.0),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.settings.low_stock_threshold, 20.0);
    }

    #[tokio::test]
    async fn get_kardex_returns_not_found_for_missing_id() {
        let mut repo = MockInventoryKardexRepository::new();
        repo.expect_find_by_id().times(1).returning(|_| Ok(None));

        let service = InventoryKardexService::new(Arc::new(repo));
        let err = service.get_kardex(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, KardexError::NotFound(_)));
    }
}
