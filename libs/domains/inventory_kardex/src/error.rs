use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum KardexError {
    #[error("Inventory kardex not found: {0}")]
    NotFound(Uuid),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: f64, available: f64 },

    #[error("Cannot release {requested} units, only {reserved} reserved")]
    InvalidReservationRelease { requested: f64, reserved: f64 },

    #[error("Movement type '{0}' cannot be recorded through this operation")]
    UnsupportedMovementType(String),

    #[error("Currency mismatch: '{left}' vs '{right}'")]
    CurrencyMismatch { left: String, right: String },

    #[error("Inventory kardex {0} failed invariant checks after mutation")]
    InvalidState(Uuid),

    #[error("Repository error: {0}")]
    Repository(String),
}

pub type KardexResult<T> = Result<T, KardexError>;
