use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{KardexError, KardexResult};
use crate::models::{
    CreateInventoryKardex, Money, Movement, MovementDetails, MovementReason, MovementStatus,
    MovementType, InventorySettings, UpdateInventoryKardex,
};

/// Totals derived from replaying a movement history.
#[derive(Debug, Clone, PartialEq)]
pub struct RecalculatedTotals {
    pub current_quantity: f64,
    pub total_cost: Money,
    /// `None` when no completed positive-quantity movements exist, in which
    /// case the previous average cost is retained.
    pub average_cost: Option<Money>,
    pub last_movement: Option<Movement>,
}

/// Severity attached to a stock alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockAlertKind {
    LowStock,
    ReorderPoint,
    NegativeStock,
}

/// Condition raised by [`InventoryKardex::stock_alerts`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAlert {
    pub kind: StockAlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub current_value: f64,
    pub threshold: f64,
}

/// Perpetual inventory record for one product in one stock scope.
///
/// Quantities are maintained incrementally by the `record_*` mutators and
/// can always be rebuilt from `initial_quantity` plus the movement history
/// via [`recalculate`]. `available_quantity` is derived:
/// `current_quantity - reserved_quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryKardex {
    pub id: Uuid,
    pub organization_id: String,
    pub product_id: String,
    pub warehouse_id: Option<String>,
    pub location_id: Option<String>,
    pub initial_quantity: f64,
    pub current_quantity: f64,
    pub reserved_quantity: f64,
    pub available_quantity: f64,
    /// Unit cost at creation time; seeds `average_cost` but never changes.
    pub unit_cost: Money,
    pub average_cost: Money,
    pub total_cost: Money,
    pub last_movement: Option<Movement>,
    pub movements: Vec<Movement>,
    pub settings: InventorySettings,
    pub is_active: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Replay a movement history into totals.
///
/// Movements are processed in `movement_date` order and only `Completed`
/// ones count. The average cost considers positive-quantity movements only,
/// so issues costed at average do not drag the average itself.
pub fn recalculate(
    initial_quantity: f64,
    currency: &str,
    movements: &[Movement],
) -> KardexResult<RecalculatedTotals> {
    let mut sorted: Vec<&Movement> = movements.iter().collect();
    sorted.sort_by(|a, b| a.movement_date.cmp(&b.movement_date));

    let mut current_quantity = initial_quantity;
    let mut total_cost = Money::zero(currency)?;
    let mut positive_quantity = 0.0;
    let mut positive_cost = Money::zero(currency)?;
    let mut last_movement: Option<Movement> = None;

    for movement in sorted {
        if movement.status != MovementStatus::Completed {
            continue;
        }
        current_quantity += movement.quantity;
        total_cost = total_cost.add(&movement.total_cost)?;
        if movement.quantity > 0.0 {
            positive_quantity += movement.quantity;
            positive_cost = positive_cost.add(&movement.total_cost)?;
        }
        last_movement = Some(movement.clone());
    }

    let average_cost = if positive_quantity > 0.0 {
        Some(Money {
            amount: positive_cost.amount / positive_quantity,
            currency: currency.to_string(),
        })
    } else {
        None
    };

    Ok(RecalculatedTotals {
        current_quantity,
        total_cost,
        average_cost,
        last_movement,
    })
}

impl InventoryKardex {
    /// Create a kardex from a validated creation request.
    pub fn new(input: CreateInventoryKardex) -> KardexResult<Self> {
        let unit_cost = Money::new(input.unit_cost.amount, &input.unit_cost.currency)?;
        let total_cost = unit_cost.scale(input.initial_quantity);
        let now = Utc::now();

        Ok(Self {
            id: Uuid::now_v7(),
            organization_id: input.organization_id.trim().to_string(),
            product_id: input.product_id.trim().to_string(),
            warehouse_id: input.warehouse_id,
            location_id: input.location_id,
            initial_quantity: input.initial_quantity,
            current_quantity: input.initial_quantity,
            reserved_quantity: 0.0,
            available_quantity: input.initial_quantity,
            unit_cost: unit_cost.clone(),
            average_cost: unit_cost,
            total_cost,
            last_movement: None,
            movements: Vec::new(),
            settings: input.settings,
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn currency(&self) -> &str {
        &self.average_cost.currency
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Rebuild cached totals from the full movement history.
    fn apply_recalculation(&mut self) -> KardexResult<()> {
        let totals = recalculate(self.initial_quantity, self.currency(), &self.movements)?;
        self.current_quantity = totals.current_quantity;
        self.total_cost = totals.total_cost;
        if let Some(average) = totals.average_cost {
            self.average_cost = average;
        }
        self.available_quantity = self.current_quantity - self.reserved_quantity;
        self.last_movement = totals.last_movement;
        self.touch();
        Ok(())
    }

    /// Record a stock receipt. The caller supplies the actual unit cost.
    pub fn record_in_movement(
        &mut self,
        reason: MovementReason,
        quantity: f64,
        unit_cost: Money,
        details: MovementDetails,
    ) -> KardexResult<&Movement> {
        self.average_cost.same_currency(&unit_cost)?;
        let movement = Movement::build(
            &self.product_id,
            self.warehouse_id.clone(),
            self.location_id.clone(),
            MovementType::In,
            reason,
            quantity,
            unit_cost,
            details,
        );
        self.push_movement(movement)
    }

    /// Record a stock issue, costed at the current average cost and stored
    /// with a negative quantity.
    pub fn record_out_movement(
        &mut self,
        reason: MovementReason,
        quantity: f64,
        details: MovementDetails,
    ) -> KardexResult<&Movement> {
        if quantity > self.available_quantity && !self.settings.allow_negative_stock {
            return Err(KardexError::InsufficientStock {
                requested: quantity,
                available: self.available_quantity,
            });
        }
        let movement = Movement::build(
            &self.product_id,
            self.warehouse_id.clone(),
            self.location_id.clone(),
            MovementType::Out,
            reason,
            -quantity,
            self.average_cost.clone(),
            details,
        );
        self.push_movement(movement)
    }

    /// Record the outbound leg of a transfer. Transfers never draw stock
    /// negative, regardless of the negative-stock setting.
    pub fn record_transfer_movement(
        &mut self,
        quantity: f64,
        details: MovementDetails,
    ) -> KardexResult<&Movement> {
        if quantity > self.available_quantity {
            return Err(KardexError::InsufficientStock {
                requested: quantity,
                available: self.available_quantity,
            });
        }
        let movement = Movement::build(
            &self.product_id,
            self.warehouse_id.clone(),
            self.location_id.clone(),
            MovementType::Transfer,
            MovementReason::TransferOut,
            -quantity,
            self.average_cost.clone(),
            details,
        );
        self.push_movement(movement)
    }

    /// Record a signed adjustment at a caller-supplied unit cost. No
    /// availability check applies; negative adjustments may drive stock
    /// below zero.
    pub fn record_adjustment_movement(
        &mut self,
        reason: MovementReason,
        quantity: f64,
        unit_cost: Money,
        details: MovementDetails,
    ) -> KardexResult<&Movement> {
        self.average_cost.same_currency(&unit_cost)?;
        let movement = Movement::build(
            &self.product_id,
            self.warehouse_id.clone(),
            self.location_id.clone(),
            MovementType::Adjustment,
            reason,
            quantity,
            unit_cost,
            details,
        );
        self.push_movement(movement)
    }

    fn push_movement(&mut self, movement: Movement) -> KardexResult<&Movement> {
        self.movements.push(movement);
        if let Err(err) = self.apply_recalculation() {
            self.movements.pop();
            return Err(err);
        }
        self.movements.last().ok_or(KardexError::InvalidState(self.id))
    }

    /// Set aside available stock without creating a movement.
    pub fn reserve_quantity(&mut self, quantity: f64) -> KardexResult<()> {
        if quantity <= 0.0 {
            return Err(KardexError::Validation(
                "Reservation quantity must be positive".to_string(),
            ));
        }
        if quantity > self.available_quantity {
            return Err(KardexError::InsufficientStock {
                requested: quantity,
                available: self.available_quantity,
            });
        }
        self.reserved_quantity += quantity;
        self.available_quantity = self.current_quantity - self.reserved_quantity;
        self.touch();
        Ok(())
    }

    /// Return previously reserved stock to the available pool.
    pub fn release_reservation(&mut self, quantity: f64) -> KardexResult<()> {
        if quantity <= 0.0 {
            return Err(KardexError::Validation(
                "Release quantity must be positive".to_string(),
            ));
        }
        if quantity > self.reserved_quantity {
            return Err(KardexError::InvalidReservationRelease {
                requested: quantity,
                reserved: self.reserved_quantity,
            });
        }
        self.reserved_quantity -= quantity;
        self.available_quantity = self.current_quantity - self.reserved_quantity;
        self.touch();
        Ok(())
    }

    /// Apply an update request: relocation and a settings patch.
    pub fn apply_update(&mut self, update: UpdateInventoryKardex) {
        if let Some(warehouse_id) = update.warehouse_id {
            self.warehouse_id = Some(warehouse_id);
        }
        if let Some(location_id) = update.location_id {
            self.location_id = Some(location_id);
        }
        if let Some(patch) = update.settings {
            self.settings.apply_patch(patch);
        }
        self.touch();
    }

    /// Check the record's invariants. Negative current or available stock
    /// is only legal when `allow_negative_stock` is set.
    pub fn validate(&self) -> bool {
        if self.product_id.trim().is_empty() {
            return false;
        }
        if self.current_quantity < 0.0 && !self.settings.allow_negative_stock {
            return false;
        }
        if self.reserved_quantity < 0.0 {
            return false;
        }
        if self.available_quantity < 0.0 && !self.settings.allow_negative_stock {
            return false;
        }
        true
    }

    pub fn is_low_stock(&self) -> bool {
        self.available_quantity <= self.settings.low_stock_threshold
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.available_quantity <= 0.0
    }

    pub fn needs_reorder(&self) -> bool {
        self.available_quantity <= self.settings.reorder_point
    }

    pub fn stock_value(&self) -> Money {
        self.average_cost.scale(self.current_quantity)
    }

    pub fn available_stock_value(&self) -> Money {
        self.average_cost.scale(self.available_quantity)
    }

    pub fn reserved_stock_value(&self) -> Money {
        self.average_cost.scale(self.reserved_quantity)
    }

    /// Outbound volume over the period divided by average stock on hand,
    /// zero when no stock is held.
    pub fn stock_turnover(&self, period_days: i64) -> f64 {
        if self.current_quantity <= 0.0 {
            return 0.0;
        }
        let cutoff = Utc::now() - Duration::days(period_days);
        let issued: f64 = self
            .movements
            .iter()
            .filter(|m| {
                m.status == MovementStatus::Completed
                    && m.movement_type == MovementType::Out
                    && m.movement_date >= cutoff
            })
            .map(|m| m.quantity.abs())
            .sum();
        issued / (self.current_quantity / 2.0)
    }

    /// Completed receipt movements whose batch has already expired.
    pub fn expired_items(&self) -> Vec<&Movement> {
        let now = Utc::now();
        self.movements
            .iter()
            .filter(|m| {
                m.status == MovementStatus::Completed
                    && m.quantity > 0.0
                    && m.expiration_date.is_some_and(|d| d <= now)
            })
            .collect()
    }

    /// Completed receipt movements expiring within the next `days` days.
    pub fn expiring_items(&self, days: i64) -> Vec<&Movement> {
        let now = Utc::now();
        let horizon = now + Duration::days(days);
        self.movements
            .iter()
            .filter(|m| {
                m.status == MovementStatus::Completed
                    && m.quantity > 0.0
                    && m.expiration_date
                        .is_some_and(|d| d > now && d <= horizon)
            })
            .collect()
    }

    /// Alerts currently raised by this record's stock position.
    pub fn stock_alerts(&self) -> Vec<StockAlert> {
        let mut alerts = Vec::new();
        if self.current_quantity < 0.0 {
            alerts.push(StockAlert {
                kind: StockAlertKind::NegativeStock,
                severity: AlertSeverity::Critical,
                message: format!(
                    "Stock for product {} is negative: {}",
                    self.product_id, self.current_quantity
                ),
                current_value: self.current_quantity,
                threshold: 0.0,
            });
        } else if self.is_out_of_stock() {
            alerts.push(StockAlert {
                kind: StockAlertKind::LowStock,
                severity: AlertSeverity::High,
                message: format!("Product {} is out of stock", self.product_id),
                current_value: self.available_quantity,
                threshold: 0.0,
            });
        } else if self.is_low_stock() {
            alerts.push(StockAlert {
                kind: StockAlertKind::LowStock,
                severity: AlertSeverity::Medium,
                message: format!(
                    "Product {} is below the low stock threshold ({} <= {})",
                    self.product_id, self.available_quantity, self.settings.low_stock_threshold
                ),
                current_value: self.available_quantity,
                threshold: self.settings.low_stock_threshold,
            });
        }
        if self.needs_reorder() {
            alerts.push(StockAlert {
                kind: StockAlertKind::ReorderPoint,
                severity: AlertSeverity::Medium,
                message: format!(
                    "Product {} has reached its reorder point ({} <= {})",
                    self.product_id, self.available_quantity, self.settings.reorder_point
                ),
                current_value: self.available_quantity,
                threshold: self.settings.reorder_point,
            });
        }
        alerts
    }
}
