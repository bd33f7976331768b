//! Parking session repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{ExitRecord, NewSession, ParkingSession};
use super::payment::{GatewayStatus, PaymentAttempt, Settlement};
use crate::domain::DomainResult;

/// Session persistence. Every state-changing method is a compare-and-swap
/// on the session's current status, so concurrent callers racing on the same
/// session see exactly one winner.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert an Active session for an already reserved slot.
    ///
    /// `PlateAlreadyParked` when the plate already has an Active session in
    /// the lot.
    async fn open(&self, session: NewSession) -> DomainResult<ParkingSession>;

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<ParkingSession>>;

    async fn find_active_by_plate(
        &self,
        lot_id: i32,
        plate: &str,
    ) -> DomainResult<Option<ParkingSession>>;

    /// Active -> AwaitingPayment and free the session's slot, atomically.
    ///
    /// `NoActiveSession` when the session is no longer Active.
    async fn close_and_release(
        &self,
        session_id: i32,
        exit: ExitRecord,
    ) -> DomainResult<ParkingSession>;

    /// AwaitingPayment | PaymentFailed -> PaymentPending, recording `attempt`
    /// as the current payment. `InvalidTransition` or `Conflict` when another
    /// caller got there first.
    async fn begin_payment(
        &self,
        session_id: i32,
        attempt: PaymentAttempt,
    ) -> DomainResult<ParkingSession>;

    /// Bump the session's attempt counter to `attempt_no` after the gateway
    /// refused that cash-in. Status and payment reference are untouched.
    /// `Conflict` when the number was already used.
    async fn record_rejected_attempt(
        &self,
        session_id: i32,
        attempt_no: u32,
        at: DateTime<Utc>,
    ) -> DomainResult<ParkingSession>;

    /// Apply a gateway outcome for `reference`.
    ///
    /// The attempt is always updated. The session only moves when the
    /// reference is its current one and it is PaymentPending. A move to Paid
    /// adds the fee to the lot's income for the exit date, exactly once.
    /// `NotFound` for an unknown reference.
    async fn settle_payment(
        &self,
        reference: &str,
        outcome: GatewayStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<Settlement>;

    async fn find_attempt(&self, reference: &str) -> DomainResult<Option<PaymentAttempt>>;

    /// Attempts of a session, oldest first.
    async fn attempts_for_session(&self, session_id: i32) -> DomainResult<Vec<PaymentAttempt>>;

    /// Sessions in PaymentPending, optionally restricted to one lot.
    async fn find_pending_payments(&self, lot_id: Option<i32>)
        -> DomainResult<Vec<ParkingSession>>;
}
