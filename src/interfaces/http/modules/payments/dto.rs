//! Payment DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::application::ReconcileOutcome;
use crate::domain::PaymentAttempt;
use crate::interfaces::http::modules::parking::SessionDto;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InitiatePaymentRequest {
    /// Payer's mobile-money number, local (`07...`) or international.
    #[validate(length(min = 9, max = 16))]
    pub phone: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttemptDto {
    pub reference: String,
    pub attempt_no: u32,
    pub idempotency_key: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub phone: String,
    pub status: String,
    pub gateway_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentAttempt> for AttemptDto {
    fn from(a: PaymentAttempt) -> Self {
        Self {
            reference: a.reference,
            attempt_no: a.attempt_no,
            idempotency_key: a.idempotency_key,
            amount: a.amount,
            phone: a.phone,
            status: a.status.as_str().to_string(),
            gateway_status: a.gateway_status,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionDetailDto {
    pub session: SessionDto,
    pub attempts: Vec<AttemptDto>,
}

/// Result of applying a gateway outcome.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReconcileDto {
    /// `applied`, `ignored`, `pending` or `unknown_reference`.
    pub outcome: String,
    pub status: Option<String>,
}

impl ReconcileDto {
    pub fn unknown_reference() -> Self {
        Self {
            outcome: "unknown_reference".to_string(),
            status: None,
        }
    }
}

impl From<ReconcileOutcome> for ReconcileDto {
    fn from(outcome: ReconcileOutcome) -> Self {
        let (outcome, status) = match outcome {
            ReconcileOutcome::Applied(s) => ("applied", Some(s.to_string())),
            ReconcileOutcome::Ignored(s) => ("ignored", Some(s.to_string())),
            ReconcileOutcome::StillPending => ("pending", None),
        };
        Self {
            outcome: outcome.to_string(),
            status,
        }
    }
}
