use rust_decimal::Decimal;
use thiserror::Error;
use tracing::error;

/// Every public operation in this crate returns `Result<_, ServiceError>`. An operation either
/// fully succeeds and commits, or fails and leaves no effect — there is no partial-success
/// variant. Blocking issues (an order that cannot yet progress) are not errors; they are data
/// produced by `services::blocking_issues` and carried on the relevant order, not raised here.
#[derive(Error, Debug)]
pub enum ServiceError {
    // --- Not-found: caller error, 404-equivalent ---
    #[error("unknown item: {0}")]
    UnknownItem(i64),

    #[error("unknown location: {0}")]
    UnknownLocation(i64),

    #[error("unknown reservation: {0}")]
    UnknownReservation(uuid::Uuid),

    #[error("unknown order: {0}")]
    UnknownOrder(String),

    // --- Validation: caller error, field-level detail ---
    #[error("duplicate SKU: {0}")]
    DuplicateSku(String),

    #[error("invalid unit: {0}")]
    InvalidUnit(String),

    #[error("units are not commensurable: cannot convert {from} to {to}")]
    IncommensurableUnits { from: String, to: String },

    #[error("BOM cycle detected: {0} appears in its own component tree")]
    BomCycle(i64),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("negative quantity is not allowed: {0}")]
    NegativeQuantity(Decimal),

    // --- Business-rule: caller error, actionable message ---
    #[error("insufficient stock for item {item_id} at location {location_id}: need {required}, have {available}")]
    InsufficientStock {
        item_id: i64,
        location_id: i64,
        required: Decimal,
        available: Decimal,
    },

    #[error("insufficient reservation {reservation_id}: need {required}, reserved {reserved}")]
    InsufficientReservation {
        reservation_id: uuid::Uuid,
        required: Decimal,
        reserved: Decimal,
    },

    #[error("item {0} has no active BOM")]
    MissingActiveBom(i64),

    #[error("shipment blocked: {0}")]
    ShipmentBlocked(String),

    // --- Concurrency: transient, retry-safe with the same idempotency key ---
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    // --- Internal: fatal, never auto-healed ---
    #[error("catalog inconsistency: {0}")]
    CatalogInconsistency(String),

    #[error("ledger corruption: {0}")]
    LedgerCorruption(String),

    #[error("internal error")]
    Internal,
}

impl ServiceError {
    /// Concurrency conflicts are the only kind a caller should retry, and only with the same
    /// idempotency key that produced them.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::ConcurrencyConflict(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServiceError::CatalogInconsistency(_) | ServiceError::LedgerCorruption(_) | ServiceError::Internal
        )
    }
}

impl From<sea_orm::DbErr> for ServiceError {
    fn from(err: sea_orm::DbErr) -> Self {
        error!(error = %err, "database error mapped to ServiceError::Internal");
        ServiceError::Internal
    }
}
