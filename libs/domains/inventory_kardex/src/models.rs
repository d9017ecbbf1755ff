use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

use crate::error::{KardexError, KardexResult};

/// Monetary amount paired with its currency code.
///
/// Arithmetic between two `Money` values is only defined for the same
/// currency; mixing currencies fails with [`KardexError::CurrencyMismatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

impl Money {
    /// Create a `Money` value, validating the currency code.
    ///
    /// The code must be three ASCII letters and is normalized to uppercase.
    pub fn new(amount: f64, currency: &str) -> KardexResult<Self> {
        let currency = currency.trim().to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(KardexError::Validation(format!(
                "Invalid currency code '{currency}'"
            )));
        }
        if !amount.is_finite() {
            return Err(KardexError::Validation(
                "Money amount must be a finite number".to_string(),
            ));
        }
        Ok(Self { amount, currency })
    }

    pub fn zero(currency: &str) -> KardexResult<Self> {
        Self::new(0.0, currency)
    }

    pub fn same_currency(&self, other: &Money) -> KardexResult<()> {
        if self.currency != other.currency {
            return Err(KardexError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        Ok(())
    }

    pub fn add(&self, other: &Money) -> KardexResult<Money> {
        self.same_currency(other)?;
        Ok(Money {
            amount: self.amount + other.amount,
            currency: self.currency.clone(),
        })
    }

    pub fn sub(&self, other: &Money) -> KardexResult<Money> {
        self.same_currency(other)?;
        Ok(Money {
            amount: self.amount - other.amount,
            currency: self.currency.clone(),
        })
    }

    /// Multiply the amount by a factor, keeping the currency.
    pub fn scale(&self, factor: f64) -> Money {
        Money {
            amount: self.amount * factor,
            currency: self.currency.clone(),
        }
    }
}

/// Kind of inventory transaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MovementType {
    In,
    Out,
    Transfer,
    Adjustment,
    Return,
    Damage,
    Expired,
    Theft,
}

/// Business reason behind a movement.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MovementReason {
    Purchase,
    Sale,
    TransferIn,
    TransferOut,
    Adjustment,
    Return,
    Damage,
    Expired,
    Theft,
    Production,
    Consumption,
    Other,
}

/// Lifecycle status of a movement. Only `Completed` movements participate
/// in quantity and cost recalculation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MovementStatus {
    Pending,
    #[default]
    Completed,
    Cancelled,
    Reversed,
}

/// Costing / valuation method configured on a kardex.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CostMethod {
    Fifo,
    Lifo,
    #[default]
    Average,
    Standard,
}

/// Optional attributes shared by all movement kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementDetails {
    pub reference: Option<String>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub batch_number: Option<String>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub serial_number: Option<String>,
    pub supplier_id: Option<String>,
    pub customer_id: Option<String>,
    pub user_id: Option<String>,
}

/// One inventory transaction recorded against a kardex.
///
/// Immutable once created. The quantity is signed: positive for stock
/// increases, negative for issues and transfers out. `total_cost` always
/// equals `quantity * unit_cost.amount`, sign included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub id: Uuid,
    pub product_id: String,
    pub warehouse_id: Option<String>,
    pub location_id: Option<String>,
    pub movement_type: MovementType,
    pub movement_reason: MovementReason,
    pub quantity: f64,
    pub unit_cost: Money,
    pub total_cost: Money,
    pub reference: Option<String>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub batch_number: Option<String>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub serial_number: Option<String>,
    pub supplier_id: Option<String>,
    pub customer_id: Option<String>,
    pub user_id: Option<String>,
    pub movement_date: DateTime<Utc>,
    pub status: MovementStatus,
}

impl Movement {
    /// Build a completed movement stamped with a fresh id and the current time.
    ///
    /// `quantity` is signed; callers pass the already-negated value for
    /// out/transfer movements.
    pub(crate) fn build(
        product_id: &str,
        warehouse_id: Option<String>,
        location_id: Option<String>,
        movement_type: MovementType,
        movement_reason: MovementReason,
        quantity: f64,
        unit_cost: Money,
        details: MovementDetails,
    ) -> Self {
        let total_cost = unit_cost.scale(quantity);
        Self {
            id: Uuid::now_v7(),
            product_id: product_id.to_string(),
            warehouse_id,
            location_id,
            movement_type,
            movement_reason,
            quantity,
            unit_cost,
            total_cost,
            reference: details.reference,
            reference_id: details.reference_id,
            notes: details.notes,
            batch_number: details.batch_number,
            expiration_date: details.expiration_date,
            serial_number: details.serial_number,
            supplier_id: details.supplier_id,
            customer_id: details.customer_id,
            user_id: details.user_id,
            movement_date: Utc::now(),
            status: MovementStatus::Completed,
        }
    }

    /// Standalone receipt movement (reason `purchase`), for batch/import
    /// flows where no aggregate instance is at hand.
    pub fn purchase(
        product_id: &str,
        quantity: f64,
        unit_cost: Money,
        warehouse_id: Option<String>,
        location_id: Option<String>,
        details: MovementDetails,
    ) -> Self {
        Self::build(
            product_id,
            warehouse_id,
            location_id,
            MovementType::In,
            MovementReason::Purchase,
            quantity,
            unit_cost,
            details,
        )
    }

    /// Standalone issue movement (reason `sale`); stores a negative quantity.
    pub fn sale(
        product_id: &str,
        quantity: f64,
        unit_cost: Money,
        warehouse_id: Option<String>,
        location_id: Option<String>,
        details: MovementDetails,
    ) -> Self {
        Self::build(
            product_id,
            warehouse_id,
            location_id,
            MovementType::Out,
            MovementReason::Sale,
            -quantity,
            unit_cost,
            details,
        )
    }

    /// Standalone adjustment movement; quantity may be positive or negative.
    pub fn adjustment(
        product_id: &str,
        quantity: f64,
        unit_cost: Money,
        warehouse_id: Option<String>,
        location_id: Option<String>,
        reason: MovementReason,
        details: MovementDetails,
    ) -> Self {
        Self::build(
            product_id,
            warehouse_id,
            location_id,
            MovementType::Adjustment,
            reason,
            quantity,
            unit_cost,
            details,
        )
    }
}

/// Per-kardex inventory policy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct InventorySettings {
    pub track_inventory: bool,
    pub allow_negative_stock: bool,
    #[validate(range(min = 0.0))]
    pub low_stock_threshold: f64,
    #[validate(range(min = 0.0))]
    pub reorder_point: f64,
    #[validate(range(min = 0.0))]
    pub reorder_quantity: f64,
    pub cost_method: CostMethod,
    pub valuation_method: CostMethod,
    pub auto_reorder: bool,
    pub track_expiration: bool,
    pub track_serial_numbers: bool,
    pub track_batch_numbers: bool,
    #[serde(default)]
    pub custom_fields: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            track_inventory: true,
            allow_negative_stock: false,
            low_stock_threshold: 0.0,
            reorder_point: 0.0,
            reorder_quantity: 0.0,
            cost_method: CostMethod::Average,
            valuation_method: CostMethod::Average,
            auto_reorder: false,
            track_expiration: false,
            track_serial_numbers: false,
            track_batch_numbers: false,
            custom_fields: HashMap::new(),
            tags: Vec::new(),
            notes: String::new(),
        }
    }
}

impl InventorySettings {
    /// Merge a partial update over the current settings.
    ///
    /// Absent fields keep their prior value; `custom_fields` is merged
    /// key-by-key rather than replaced; `Some(vec![])` clears `tags`.
    pub fn apply_patch(&mut self, patch: SettingsPatch) {
        if let Some(track_inventory) = patch.track_inventory {
            self.track_inventory = track_inventory;
        }
        if let Some(allow_negative_stock) = patch.allow_negative_stock {
            self.allow_negative_stock = allow_negative_stock;
        }
        if let Some(low_stock_threshold) = patch.low_stock_threshold {
            self.low_stock_threshold = low_stock_threshold;
        }
        if let Some(reorder_point) = patch.reorder_point {
            self.reorder_point = reorder_point;
        }
        if let Some(reorder_quantity) = patch.reorder_quantity {
            self.reorder_quantity = reorder_quantity;
        }
        if let Some(cost_method) = patch.cost_method {
            self.cost_method = cost_method;
        }
        if let Some(valuation_method) = patch.valuation_method {
            self.valuation_method = valuation_method;
        }
        if let Some(auto_reorder) = patch.auto_reorder {
            self.auto_reorder = auto_reorder;
        }
        if let Some(track_expiration) = patch.track_expiration {
            self.track_expiration = track_expiration;
        }
        if let Some(track_serial_numbers) = patch.track_serial_numbers {
            self.track_serial_numbers = track_serial_numbers;
        }
        if let Some(track_batch_numbers) = patch.track_batch_numbers {
            self.track_batch_numbers = track_batch_numbers;
        }
        if let Some(custom_fields) = patch.custom_fields {
            self.custom_fields.extend(custom_fields);
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
    }
}

/// Partial settings update with per-field optionality.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SettingsPatch {
    pub track_inventory: Option<bool>,
    pub allow_negative_stock: Option<bool>,
    #[validate(range(min = 0.0))]
    pub low_stock_threshold: Option<f64>,
    #[validate(range(min = 0.0))]
    pub reorder_point: Option<f64>,
    #[validate(range(min = 0.0))]
    pub reorder_quantity: Option<f64>,
    pub cost_method: Option<CostMethod>,
    pub valuation_method: Option<CostMethod>,
    pub auto_reorder: Option<bool>,
    pub track_expiration: Option<bool>,
    pub track_serial_numbers: Option<bool>,
    pub track_batch_numbers: Option<bool>,
    pub custom_fields: Option<HashMap<String, serde_json::Value>>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
}

/// Request to create a new kardex record.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInventoryKardex {
    #[validate(length(min = 1))]
    pub organization_id: String,
    #[validate(length(min = 1))]
    pub product_id: String,
    pub warehouse_id: Option<String>,
    pub location_id: Option<String>,
    #[validate(range(min = 0.0))]
    pub initial_quantity: f64,
    pub unit_cost: Money,
    #[serde(default)]
    #[validate(nested)]
    pub settings: InventorySettings,
}

/// Request to update an existing kardex record. `product_id` is immutable
/// after creation and therefore absent here.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateInventoryKardex {
    pub warehouse_id: Option<String>,
    pub location_id: Option<String>,
    #[validate(nested)]
    pub settings: Option<SettingsPatch>,
}

/// Request to record a movement against a kardex.
///
/// `unit_cost` is required for `in` and `adjustment` movements and ignored
/// for `out`/`transfer`, which are always costed at the kardex's current
/// average cost.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordMovement {
    pub inventory_kardex_id: Uuid,
    pub movement_type: MovementType,
    pub movement_reason: MovementReason,
    #[validate(range(min = 0.0))]
    pub quantity: f64,
    pub unit_cost: Option<Money>,
    pub to_warehouse_id: Option<String>,
    pub to_location_id: Option<String>,
    #[serde(flatten)]
    pub details: MovementDetails,
}
