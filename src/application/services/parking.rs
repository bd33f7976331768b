//! Parking session engine
//!
//! Drives a session from park to an accepted payment request. Slot release
//! and fee computation are local and synchronous; the gateway is only called
//! by `initiate_payment`, never while a store transaction is open, so a
//! gateway outage never keeps a physical slot occupied.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{error, info, warn};

use super::session_locks::SessionLocks;
use crate::application::context::ManagerContext;
use crate::application::ports::{CashInRequest, PaymentGateway};
use crate::domain::session::idempotency_key;
use crate::domain::{
    BillingPolicy, DailyIncome, DomainError, DomainResult, ExitRecord, GatewayStatus, NewSession,
    Occupant, ParkingLot, ParkingSession, PaymentAttempt, Plate, RepositoryProvider, Slot,
    VehicleCategory,
};
use crate::notifications::{
    Event, PaymentInitiatedEvent, SharedEventBus, SlotFreedEvent, VehicleParkedEvent,
};
use crate::shared::clock::Clock;
use crate::shared::errors::GatewayError;
use crate::shared::retry::{retry_with_backoff, RetryConfig};

pub struct ParkingService {
    repos: Arc<dyn RepositoryProvider>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    events: SharedEventBus,
    billing: BillingPolicy,
    retry: RetryConfig,
    locks: SessionLocks,
}

impl ParkingService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        events: SharedEventBus,
    ) -> Self {
        Self {
            repos,
            gateway,
            clock,
            events,
            billing: BillingPolicy::default(),
            retry: RetryConfig::default(),
            locks: SessionLocks::new(),
        }
    }

    pub fn with_billing(mut self, billing: BillingPolicy) -> Self {
        self.billing = billing;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn lot(&self, lot_id: i32) -> DomainResult<ParkingLot> {
        self.repos
            .lots()
            .find_by_id(lot_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "ParkingLot",
                field: "id",
                value: lot_id.to_string(),
            })
    }

    async fn session_by_id(&self, session_id: i32) -> DomainResult<ParkingSession> {
        self.repos
            .sessions()
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "ParkingSession",
                field: "id",
                value: session_id.to_string(),
            })
    }

    /// Reserve a slot and open an Active session for `plate`.
    ///
    /// With no `desired_slot` the lowest-numbered available slot is taken.
    /// If opening the session fails after the slot was reserved, the slot is
    /// released again before the error is returned.
    pub async fn park(
        &self,
        ctx: &ManagerContext,
        plate: &str,
        category: VehicleCategory,
        desired_slot: Option<i32>,
    ) -> DomainResult<ParkingSession> {
        let plate = Plate::parse(plate)?;
        self.lot(ctx.lot_id).await?;

        if self
            .repos
            .sessions()
            .find_active_by_plate(ctx.lot_id, plate.as_str())
            .await?
            .is_some()
        {
            return Err(DomainError::PlateAlreadyParked {
                lot_id: ctx.lot_id,
                plate: plate.to_string(),
            });
        }

        let now = self.clock.now();
        let occupant = Occupant {
            plate: plate.clone(),
            category,
        };
        let slot_id = self
            .repos
            .slots()
            .reserve(ctx.lot_id, &occupant, desired_slot, now)
            .await?;

        let opened = self
            .repos
            .sessions()
            .open(NewSession {
                lot_id: ctx.lot_id,
                slot_id,
                plate,
                category,
                entry_time: now,
                recorded_by: ctx.manager_id.clone(),
            })
            .await;

        let session = match opened {
            Ok(session) => session,
            Err(e) => {
                if let Err(release_err) = self.repos.slots().release(ctx.lot_id, slot_id).await {
                    error!(
                        lot_id = ctx.lot_id,
                        slot_id,
                        error = %release_err,
                        "Compensating slot release failed, slot left occupied"
                    );
                }
                return Err(e);
            }
        };

        metrics::counter!("parking_sessions_opened_total").increment(1);
        info!(
            session_id = session.id,
            lot_id = session.lot_id,
            slot_id = session.slot_id,
            plate = %session.plate,
            manager = %ctx.manager_id,
            "🚗 Vehicle parked"
        );
        self.events.publish(Event::VehicleParked(VehicleParkedEvent {
            lot_id: session.lot_id,
            slot_id: session.slot_id,
            session_id: session.id,
            plate: session.plate.to_string(),
            category: session.category.to_string(),
            timestamp: now,
        }));

        Ok(session)
    }

    /// Close the Active session of `plate`, free its slot and fix its fee.
    pub async fn exit(&self, ctx: &ManagerContext, plate: &str) -> DomainResult<ParkingSession> {
        let plate = Plate::parse(plate)?;
        let session = self
            .repos
            .sessions()
            .find_active_by_plate(ctx.lot_id, plate.as_str())
            .await?
            .ok_or_else(|| DomainError::NoActiveSession {
                lot_id: ctx.lot_id,
                plate: plate.to_string(),
            })?;
        let lot = self.lot(ctx.lot_id).await?;

        let exit_time = self.clock.now();
        let rate_per_minute = self.billing.rate_for(&lot, session.entry_time, exit_time)?;
        let fee = self.billing.fee(session.entry_time, exit_time, rate_per_minute)?;

        let closed = self
            .repos
            .sessions()
            .close_and_release(
                session.id,
                ExitRecord {
                    exit_time,
                    fee,
                    rate_per_minute,
                },
            )
            .await?;

        metrics::counter!("parking_sessions_closed_total").increment(1);
        info!(
            session_id = closed.id,
            lot_id = closed.lot_id,
            slot_id = closed.slot_id,
            fee = %fee,
            status = %closed.status,
            manager = %ctx.manager_id,
            "🅿️ Vehicle exited, slot freed"
        );
        self.events.publish(Event::SlotFreed(SlotFreedEvent {
            lot_id: closed.lot_id,
            slot_id: closed.slot_id,
            session_id: closed.id,
            plate: closed.plate.to_string(),
            fee,
            timestamp: exit_time,
        }));

        Ok(closed)
    }

    /// Request payment of a session's fee from `phone`.
    ///
    /// `phone` must already be normalized. Calls for the same session are
    /// serialized; the gateway request is resent on transport failures with
    /// the same idempotency key. A gateway rejection keeps the session
    /// payable, uses up the attempt number and is reported as
    /// `PaymentRejected`.
    pub async fn initiate_payment(
        &self,
        session_id: i32,
        phone: &str,
    ) -> DomainResult<ParkingSession> {
        let _guard = self.locks.lock(session_id).await;

        let session = self.session_by_id(session_id).await?;
        if !session.status.accepts_payment() {
            return Err(DomainError::InvalidTransition {
                session_id,
                status: session.status.to_string(),
                action: "initiate_payment",
            });
        }
        let amount = session.fee.ok_or_else(|| {
            DomainError::Validation(format!("Session {} has no fee", session_id))
        })?;

        let attempt_no = session.next_attempt_no();
        let request = CashInRequest {
            phone: phone.to_string(),
            amount,
            idempotency_key: idempotency_key(session_id, attempt_no),
        };

        let response = retry_with_backoff(
            self.retry.clone(),
            || self.gateway.cash_in(&request),
            GatewayError::is_retryable,
            "cash_in",
        )
        .await;

        let refusal = match &response {
            Err(GatewayError::Rejected(reason)) => Some(reason.clone()),
            Ok(accepted) => match &accepted.status {
                GatewayStatus::Failed(reason) => Some(reason.clone()),
                _ => None,
            },
            Err(_) => None,
        };
        if let Some(reason) = refusal {
            warn!(session_id, attempt_no, reason = %reason, "Cash-in rejected by gateway");
            self.repos
                .sessions()
                .record_rejected_attempt(session_id, attempt_no, self.clock.now())
                .await?;
            return Err(DomainError::PaymentRejected(reason));
        }
        let response = response.map_err(DomainError::Gateway)?;
        if response.reference.trim().is_empty() {
            return Err(DomainError::Gateway(GatewayError::Protocol(
                "cash-in accepted without a reference".to_string(),
            )));
        }

        // An immediate success is still recorded as pending; the webhook or
        // the next poll settles it through the reconciler.
        let attempt = PaymentAttempt::pending(
            response.reference,
            session_id,
            attempt_no,
            amount,
            phone,
            self.clock.now(),
        );
        let reference = attempt.reference.clone();
        let created_at = attempt.created_at;
        let updated = self
            .repos
            .sessions()
            .begin_payment(session_id, attempt)
            .await?;

        metrics::counter!("parking_payments_initiated_total").increment(1);
        info!(
            session_id,
            lot_id = updated.lot_id,
            reference = %reference,
            attempt_no,
            amount = %amount,
            status = %updated.status,
            "💳 Payment initiated"
        );
        self.events.publish(Event::PaymentInitiated(PaymentInitiatedEvent {
            session_id,
            reference,
            attempt_no,
            amount,
            timestamp: created_at,
        }));

        Ok(updated)
    }

    /// Slots of a lot with their current state.
    pub async fn slot_status(&self, lot_id: i32) -> DomainResult<Vec<Slot>> {
        self.lot(lot_id).await?;
        self.repos.slots().list_for_lot(lot_id).await
    }

    /// Sessions of a lot waiting for a gateway outcome.
    pub async fn pending_payments(&self, lot_id: i32) -> DomainResult<Vec<ParkingSession>> {
        self.lot(lot_id).await?;
        self.repos.sessions().find_pending_payments(Some(lot_id)).await
    }

    pub async fn session(
        &self,
        session_id: i32,
    ) -> DomainResult<(ParkingSession, Vec<PaymentAttempt>)> {
        let session = self.session_by_id(session_id).await?;
        let attempts = self.repos.sessions().attempts_for_session(session_id).await?;
        Ok((session, attempts))
    }

    pub async fn income(&self, lot_id: i32, day: NaiveDate) -> DomainResult<DailyIncome> {
        self.lot(lot_id).await?;
        self.repos.lots().income_for_day(lot_id, day).await
    }
}
