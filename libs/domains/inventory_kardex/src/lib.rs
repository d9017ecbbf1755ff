//! Inventory kardex domain: perpetual inventory records per product and
//! stock scope, with movement history, reservations and weighted-average
//! costing.
//!
//! # Architecture
//!
//! ```text
//! InventoryKardexService
//!         |
//! InventoryKardexRepository (trait)
//!         |
//! InMemoryKardexRepository / database implementations
//!         |
//! InventoryKardex + Movement + InventorySettings
//! ```
//!
//! The service owns the use-cases (create, record movement, update), the
//! repository trait isolates persistence, and the aggregate holds the
//! stock arithmetic. All quantity totals can be rebuilt from the movement
//! history via [`kardex::recalculate`].

pub mod error;
pub mod kardex;
pub mod memory;
pub mod models;
pub mod repository;
pub mod service;

pub use error::{KardexError, KardexResult};
pub use kardex::{
    recalculate, AlertSeverity, InventoryKardex, RecalculatedTotals, StockAlert, StockAlertKind,
};
pub use memory::InMemoryKardexRepository;
pub use models::{
    CreateInventoryKardex, InventorySettings, Money, Movement, MovementDetails, MovementReason,
    MovementStatus, MovementType, RecordMovement, SettingsPatch, UpdateInventoryKardex,
};
pub use repository::InventoryKardexRepository;
pub use service::{InventoryKardexService, MovementRecorded};
