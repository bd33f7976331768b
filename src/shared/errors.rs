use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Invalid plate number: {0}")]
    InvalidPlate(String),

    #[error("Invalid vehicle category: {0}")]
    InvalidCategory(String),

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("Exit time {exit} is before entry time {entry}")]
    InvalidInterval { entry: String, exit: String },

    #[error("Slot {slot_id} does not exist in lot {lot_id}")]
    SlotNotFound { lot_id: i32, slot_id: i32 },

    #[error("Slot {slot_id} in lot {lot_id} is already occupied")]
    SlotOccupied { lot_id: i32, slot_id: i32 },

    #[error("Slot {slot_id} in lot {lot_id} is not occupied")]
    SlotNotOccupied { lot_id: i32, slot_id: i32 },

    #[error("Lot {0} has no available slot")]
    LotFull(i32),

    #[error("No active session for plate {plate} in lot {lot_id}")]
    NoActiveSession { lot_id: i32, plate: String },

    #[error("Plate {plate} is already parked in lot {lot_id}")]
    PlateAlreadyParked { lot_id: i32, plate: String },

    #[error("Session {session_id} in state {status} does not allow {action}")]
    InvalidTransition {
        session_id: i32,
        status: String,
        action: &'static str,
    },

    #[error("Payment rejected by gateway: {0}")]
    PaymentRejected(String),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Database error: {0}")]
    Storage(String),

    #[error("Already exists: {0}")]
    Conflict(String),
}

impl DomainError {
    /// Whether this error is likely transient (DB connection lost, gateway
    /// unreachable) and the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            DomainError::Storage(_) => true,
            DomainError::Gateway(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Failures talking to the mobile-money gateway.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("request timed out")]
    Timeout,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl GatewayError {
    /// Only network-level failures are retried. A rejection is the gateway's
    /// final answer for that request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Timeout | GatewayError::Transport(_))
    }
}

/// Errors raised while applying an external payment outcome.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Webhook signature mismatch")]
    InvalidSignature,

    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("Unknown payment reference: {0}")]
    UnknownReference(String),

    #[error("Session {0} has no payment reference to poll")]
    NoPaymentReference(i32),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
