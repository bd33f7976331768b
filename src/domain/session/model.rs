//! Parking session domain entity and its state machine
//!
//! ```text
//! Active -> AwaitingPayment -> PaymentPending -> Paid
//!                                    |     ^
//!                                    v     |
//!                               PaymentFailed (retry)
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::payment::{GatewayStatus, PaymentAttempt};
use crate::domain::vehicle::{Plate, VehicleCategory};
use crate::shared::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    AwaitingPayment,
    PaymentPending,
    Paid,
    PaymentFailed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::AwaitingPayment => "AwaitingPayment",
            Self::PaymentPending => "PaymentPending",
            Self::Paid => "Paid",
            Self::PaymentFailed => "PaymentFailed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(Self::Active),
            "AwaitingPayment" => Some(Self::AwaitingPayment),
            "PaymentPending" => Some(Self::PaymentPending),
            "Paid" => Some(Self::Paid),
            "PaymentFailed" => Some(Self::PaymentFailed),
            _ => None,
        }
    }

    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Active, AwaitingPayment)
                | (AwaitingPayment, PaymentPending)
                | (PaymentFailed, PaymentPending)
                | (PaymentPending, Paid)
                | (PaymentPending, PaymentFailed)
        )
    }

    /// States from which a new payment attempt may be started.
    pub fn accepts_payment(self) -> bool {
        matches!(self, Self::AwaitingPayment | Self::PaymentFailed)
    }

    pub const PAYABLE: [SessionStatus; 2] = [Self::AwaitingPayment, Self::PaymentFailed];
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParkingSession {
    pub id: i32,
    pub lot_id: i32,
    pub slot_id: i32,
    pub plate: Plate,
    pub category: VehicleCategory,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    /// Write-once, set at exit.
    pub fee: Option<Decimal>,
    /// Per-minute rate the fee was computed with.
    pub rate_per_minute: Option<Decimal>,
    /// Reference of the latest accepted payment attempt.
    pub payment_ref: Option<String>,
    /// Attempt numbers used so far, accepted or rejected by the gateway.
    pub payment_attempts: u32,
    pub status: SessionStatus,
    /// Manager who parked the vehicle.
    pub recorded_by: String,
    pub updated_at: DateTime<Utc>,
}

/// Input for opening a session after its slot has been reserved.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub lot_id: i32,
    pub slot_id: i32,
    pub plate: Plate,
    pub category: VehicleCategory,
    pub entry_time: DateTime<Utc>,
    pub recorded_by: String,
}

impl NewSession {
    pub fn into_session(self, id: i32) -> ParkingSession {
        ParkingSession {
            id,
            lot_id: self.lot_id,
            slot_id: self.slot_id,
            plate: self.plate,
            category: self.category,
            entry_time: self.entry_time,
            exit_time: None,
            fee: None,
            rate_per_minute: None,
            payment_ref: None,
            payment_attempts: 0,
            status: SessionStatus::Active,
            recorded_by: self.recorded_by,
            updated_at: self.entry_time,
        }
    }
}

/// What `exit` stamps onto a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitRecord {
    pub exit_time: DateTime<Utc>,
    pub fee: Decimal,
    pub rate_per_minute: Decimal,
}

impl ParkingSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn next_attempt_no(&self) -> u32 {
        self.payment_attempts + 1
    }

    fn invalid_transition(&self, action: &'static str) -> DomainError {
        DomainError::InvalidTransition {
            session_id: self.id,
            status: self.status.to_string(),
            action,
        }
    }

    /// Active -> AwaitingPayment, stamping exit time and fee.
    pub fn record_exit(&mut self, exit: &ExitRecord) -> Result<(), DomainError> {
        if !self.status.can_transition_to(SessionStatus::AwaitingPayment) || self.fee.is_some() {
            return Err(self.invalid_transition("exit"));
        }
        self.exit_time = Some(exit.exit_time);
        self.fee = Some(exit.fee);
        self.rate_per_minute = Some(exit.rate_per_minute);
        self.status = SessionStatus::AwaitingPayment;
        self.updated_at = exit.exit_time;
        Ok(())
    }

    /// AwaitingPayment | PaymentFailed -> PaymentPending for an accepted
    /// cash-in. The attempt number must be the next one, which rejects a
    /// concurrent initiator that read the same session.
    pub fn begin_payment(&mut self, attempt: &PaymentAttempt) -> Result<(), DomainError> {
        if !self.status.accepts_payment() {
            return Err(self.invalid_transition("initiate_payment"));
        }
        if attempt.attempt_no != self.next_attempt_no() {
            return Err(DomainError::Conflict(format!(
                "Session {} attempt {} was already recorded",
                self.id, attempt.attempt_no
            )));
        }
        self.payment_ref = Some(attempt.reference.clone());
        self.payment_attempts = attempt.attempt_no;
        self.status = SessionStatus::PaymentPending;
        self.updated_at = attempt.created_at;
        Ok(())
    }

    /// Use up `attempt_no` after the gateway refused the cash-in outright.
    /// The status stays payable; the next request gets a fresh idempotency
    /// key so the gateway does not replay its refusal.
    pub fn record_rejected_attempt(
        &mut self,
        attempt_no: u32,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.status.accepts_payment() {
            return Err(self.invalid_transition("initiate_payment"));
        }
        if attempt_no != self.next_attempt_no() {
            return Err(DomainError::Conflict(format!(
                "Session {} attempt {} was already recorded",
                self.id, attempt_no
            )));
        }
        self.payment_attempts = attempt_no;
        self.updated_at = at;
        Ok(())
    }

    /// Apply a gateway outcome for `reference`. Only a PaymentPending session
    /// whose current reference is `reference` moves; everything else is a
    /// no-op, which makes duplicate and out-of-order deliveries harmless.
    /// Returns whether the session changed.
    pub fn settle(&mut self, reference: &str, outcome: &GatewayStatus, at: DateTime<Utc>) -> bool {
        if self.status != SessionStatus::PaymentPending
            || self.payment_ref.as_deref() != Some(reference)
        {
            return false;
        }
        let next = match outcome {
            GatewayStatus::Pending => return false,
            GatewayStatus::Successful => SessionStatus::Paid,
            GatewayStatus::Failed(_) => SessionStatus::PaymentFailed,
        };
        self.status = next;
        self.updated_at = at;
        true
    }
}
