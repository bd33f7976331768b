//! Outbound port to the mobile-money gateway
//!
//! [`PaymentGateway`] decouples the parking engine from the concrete gateway
//! API. The production implementation is
//! [`HttpPaymentGateway`](crate::infrastructure::gateway::HttpPaymentGateway).

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::GatewayStatus;
use crate::shared::errors::GatewayError;

/// A cash-in (collection) request.
#[derive(Debug, Clone, PartialEq)]
pub struct CashInRequest {
    /// Normalized payer phone number.
    pub phone: String,
    /// Exact amount owed. Implementations round to what the gateway accepts.
    pub amount: Decimal,
    /// Same value for every resend of one attempt.
    pub idempotency_key: String,
}

/// Gateway answer to a cash-in request.
#[derive(Debug, Clone, PartialEq)]
pub struct CashInResponse {
    pub reference: String,
    pub status: GatewayStatus,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Ask the gateway to collect `amount` from `phone`.
    ///
    /// `GatewayError::Rejected` is the gateway's final answer for this
    /// request; `Timeout` and `Transport` may be retried with the same
    /// idempotency key.
    async fn cash_in(&self, request: &CashInRequest) -> Result<CashInResponse, GatewayError>;

    /// Current status of a transaction.
    async fn transaction_status(&self, reference: &str) -> Result<GatewayStatus, GatewayError>;
}
