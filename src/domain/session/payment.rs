//! Payment attempts against the mobile-money gateway

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::model::ParkingSession;

/// Idempotency key sent with the cash-in request for `attempt_no` of a
/// session. Stable across transport retries of the same attempt.
pub fn idempotency_key(session_id: i32, attempt_no: u32) -> String {
    format!("parking-{}-{}", session_id, attempt_no)
}

/// Transaction status as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    Pending,
    Successful,
    /// Any terminal non-success status, carrying the gateway's word for it.
    Failed(String),
}

impl GatewayStatus {
    /// Map a raw gateway status string. Anything the gateway does not call
    /// pending or successful is a failure.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "processing" => Self::Pending,
            "successful" | "success" | "completed" => Self::Successful,
            other => Self::Failed(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Successful => "successful",
            Self::Failed(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptStatus {
    Pending,
    Successful,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Successful => "Successful",
            Self::Failed => "Failed",
        }
    }

    /// Final attempt status for a gateway outcome; `None` while pending.
    pub fn settled_by(outcome: &GatewayStatus) -> Option<Self> {
        match outcome {
            GatewayStatus::Pending => None,
            GatewayStatus::Successful => Some(Self::Successful),
            GatewayStatus::Failed(_) => Some(Self::Failed),
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Self::Pending),
            "Successful" => Some(Self::Successful),
            "Failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One accepted cash-in request. Attempts are kept after being superseded so
/// late gateway callbacks can still be matched and audited.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentAttempt {
    /// Gateway transaction reference. Unique across all attempts.
    pub reference: String,
    pub session_id: i32,
    pub attempt_no: u32,
    pub idempotency_key: String,
    /// Exact fee owed for the session.
    pub amount: Decimal,
    /// Normalized payer phone number.
    pub phone: String,
    pub status: AttemptStatus,
    /// Last raw status seen from the gateway.
    pub gateway_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentAttempt {
    pub fn pending(
        reference: impl Into<String>,
        session_id: i32,
        attempt_no: u32,
        amount: Decimal,
        phone: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            reference: reference.into(),
            session_id,
            attempt_no,
            idempotency_key: idempotency_key(session_id, attempt_no),
            amount,
            phone: phone.into(),
            status: AttemptStatus::Pending,
            gateway_status: Some(GatewayStatus::Pending.as_str().to_string()),
            created_at: at,
            updated_at: at,
        }
    }

    /// Record a terminal gateway outcome on a still-pending attempt. Returns
    /// whether the attempt changed.
    pub fn resolve(&mut self, outcome: &GatewayStatus, at: DateTime<Utc>) -> bool {
        if self.status != AttemptStatus::Pending {
            return false;
        }
        let Some(next) = AttemptStatus::settled_by(outcome) else {
            return false;
        };
        self.status = next;
        self.gateway_status = Some(outcome.as_str().to_string());
        self.updated_at = at;
        true
    }
}

/// Result of applying a gateway outcome.
#[derive(Debug, Clone)]
pub struct Settlement {
    /// Session state after the outcome was applied.
    pub session: ParkingSession,
    /// Whether the session moved. False for duplicates, pending outcomes and
    /// outcomes for superseded references.
    pub applied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn idempotency_key_is_stable_per_attempt() {
        assert_eq!(idempotency_key(42, 1), "parking-42-1");
        assert_eq!(idempotency_key(42, 1), idempotency_key(42, 1));
        assert_ne!(idempotency_key(42, 1), idempotency_key(42, 2));
    }

    #[test]
    fn gateway_status_parse() {
        assert_eq!(GatewayStatus::parse("pending"), GatewayStatus::Pending);
        assert_eq!(GatewayStatus::parse("SUCCESSFUL"), GatewayStatus::Successful);
        assert_eq!(
            GatewayStatus::parse("failed"),
            GatewayStatus::Failed("failed".into())
        );
        assert_eq!(
            GatewayStatus::parse("expired"),
            GatewayStatus::Failed("expired".into())
        );
        assert_eq!(AttemptStatus::settled_by(&GatewayStatus::Pending), None);
        assert_eq!(
            AttemptStatus::settled_by(&GatewayStatus::Failed("expired".into())),
            Some(AttemptStatus::Failed)
        );
    }

    #[test]
    fn attempt_resolves_once() {
        let now = Utc::now();
        let mut attempt = PaymentAttempt::pending("R1", 1, 1, dec!(50.001), "+250788123456", now);
        assert_eq!(attempt.idempotency_key, "parking-1-1");
        assert!(!attempt.resolve(&GatewayStatus::Pending, now));
        assert!(attempt.resolve(&GatewayStatus::Successful, now));
        assert_eq!(attempt.status, AttemptStatus::Successful);
        assert!(!attempt.resolve(&GatewayStatus::Failed("failed".into()), now));
        assert_eq!(attempt.status, AttemptStatus::Successful);
    }
}
