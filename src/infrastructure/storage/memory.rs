//! In-memory storage implementation
//!
//! Every mutation is a compare-and-swap under the DashMap shard guard of the
//! one key it touches. Guards on different maps are always taken in this
//! order, and a guard is never held while going back to an earlier map:
//!
//! `active_by_plate` -> `sessions` -> `attempts` -> `income`
//!
//! Slot guards are never held together with any other guard.

use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::error;

use crate::domain::{
    DailyIncome, DomainError, DomainResult, ExitRecord, GatewayStatus, LotRepository, NewLot,
    NewSession, Occupant, ParkingLot, ParkingSession, PaymentAttempt, RateChange,
    RepositoryProvider, SessionRepository, SessionStatus, Settlement, Slot, SlotStore,
};

/// In-memory storage for development and testing
pub struct InMemoryRepositoryProvider {
    lots: DashMap<i32, ParkingLot>,
    slots: DashMap<(i32, i32), Slot>,
    sessions: DashMap<i32, ParkingSession>,
    /// (lot, plate) -> id of the plate's Active session
    active_by_plate: DashMap<(i32, String), i32>,
    attempts: DashMap<String, PaymentAttempt>,
    income: DashMap<(i32, NaiveDate), DailyIncome>,
    lot_counter: AtomicI32,
    session_counter: AtomicI32,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self {
            lots: DashMap::new(),
            slots: DashMap::new(),
            sessions: DashMap::new(),
            active_by_plate: DashMap::new(),
            attempts: DashMap::new(),
            income: DashMap::new(),
            lot_counter: AtomicI32::new(1),
            session_counter: AtomicI32::new(1),
        }
    }

    fn session_not_found(id: i32) -> DomainError {
        DomainError::NotFound {
            entity: "ParkingSession",
            field: "id",
            value: id.to_string(),
        }
    }

    fn lot_not_found(id: i32) -> DomainError {
        DomainError::NotFound {
            entity: "ParkingLot",
            field: "id",
            value: id.to_string(),
        }
    }
}

impl Default for InMemoryRepositoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
    fn lots(&self) -> &dyn LotRepository {
        self
    }

    fn slots(&self) -> &dyn SlotStore {
        self
    }

    fn sessions(&self) -> &dyn SessionRepository {
        self
    }
}

#[async_trait]
impl LotRepository for InMemoryRepositoryProvider {
    async fn create(&self, lot: NewLot) -> DomainResult<ParkingLot> {
        let id = self.lot_counter.fetch_add(1, Ordering::SeqCst);
        for number in lot.slots.numbers() {
            self.slots.insert((id, number), Slot::available(id, number));
        }
        let created = ParkingLot {
            id,
            name: lot.name,
            total_slots: lot.slots.get(),
            rates: vec![RateChange {
                rate_per_minute: lot.rate_per_minute,
                effective_from: lot.effective_from,
            }],
            created_at: Utc::now(),
        };
        // Published last so nobody sees a lot without its slots.
        self.lots.insert(id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<ParkingLot>> {
        Ok(self.lots.get(&id).map(|lot| lot.clone()))
    }

    async fn find_all(&self) -> DomainResult<Vec<ParkingLot>> {
        let mut lots: Vec<_> = self.lots.iter().map(|e| e.value().clone()).collect();
        lots.sort_by_key(|l| l.id);
        Ok(lots)
    }

    async fn append_rate(&self, lot_id: i32, change: RateChange) -> DomainResult<()> {
        let mut lot = self
            .lots
            .get_mut(&lot_id)
            .ok_or_else(|| Self::lot_not_found(lot_id))?;
        lot.validate_rate_change(&change)?;
        lot.rates.push(change);
        Ok(())
    }

    async fn income_for_day(&self, lot_id: i32, day: NaiveDate) -> DomainResult<DailyIncome> {
        Ok(self
            .income
            .get(&(lot_id, day))
            .map(|i| i.clone())
            .unwrap_or_else(|| DailyIncome::empty(lot_id, day)))
    }
}

#[async_trait]
impl SlotStore for InMemoryRepositoryProvider {
    async fn reserve(
        &self,
        lot_id: i32,
        occupant: &Occupant,
        desired: Option<i32>,
        at: DateTime<Utc>,
    ) -> DomainResult<i32> {
        match desired {
            Some(slot_id) => {
                let mut slot = self
                    .slots
                    .get_mut(&(lot_id, slot_id))
                    .ok_or(DomainError::SlotNotFound { lot_id, slot_id })?;
                if slot.try_occupy(occupant, at) {
                    Ok(slot_id)
                } else {
                    Err(DomainError::SlotOccupied { lot_id, slot_id })
                }
            }
            None => {
                let total = self
                    .lots
                    .get(&lot_id)
                    .map(|lot| lot.total_slots)
                    .ok_or_else(|| Self::lot_not_found(lot_id))?;
                for number in 1..=total {
                    if let Some(mut slot) = self.slots.get_mut(&(lot_id, number)) {
                        if slot.try_occupy(occupant, at) {
                            return Ok(number);
                        }
                    }
                }
                Err(DomainError::LotFull(lot_id))
            }
        }
    }

    async fn release(&self, lot_id: i32, slot_id: i32) -> DomainResult<()> {
        let mut slot = self
            .slots
            .get_mut(&(lot_id, slot_id))
            .ok_or(DomainError::SlotNotFound { lot_id, slot_id })?;
        if slot.try_free() {
            Ok(())
        } else {
            Err(DomainError::SlotNotOccupied { lot_id, slot_id })
        }
    }

    async fn list_for_lot(&self, lot_id: i32) -> DomainResult<Vec<Slot>> {
        let total = match self.lots.get(&lot_id) {
            Some(lot) => lot.total_slots,
            None => return Ok(Vec::new()),
        };
        Ok((1..=total)
            .filter_map(|n| self.slots.get(&(lot_id, n)).map(|s| s.clone()))
            .collect())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepositoryProvider {
    async fn open(&self, session: NewSession) -> DomainResult<ParkingSession> {
        let key = (session.lot_id, session.plate.as_str().to_string());
        match self.active_by_plate.entry(key) {
            Entry::Occupied(mut entry) => {
                let still_active = self
                    .sessions
                    .get(entry.get())
                    .map(|s| s.is_active())
                    .unwrap_or(false);
                if still_active {
                    return Err(DomainError::PlateAlreadyParked {
                        lot_id: session.lot_id,
                        plate: session.plate.to_string(),
                    });
                }
                let id = self.session_counter.fetch_add(1, Ordering::SeqCst);
                let opened = session.into_session(id);
                entry.insert(id);
                self.sessions.insert(id, opened.clone());
                Ok(opened)
            }
            Entry::Vacant(entry) => {
                let id = self.session_counter.fetch_add(1, Ordering::SeqCst);
                let opened = session.into_session(id);
                entry.insert(id);
                self.sessions.insert(id, opened.clone());
                Ok(opened)
            }
        }
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<ParkingSession>> {
        Ok(self.sessions.get(&id).map(|s| s.clone()))
    }

    async fn find_active_by_plate(
        &self,
        lot_id: i32,
        plate: &str,
    ) -> DomainResult<Option<ParkingSession>> {
        let id = match self.active_by_plate.get(&(lot_id, plate.to_string())) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self
            .sessions
            .get(&id)
            .filter(|s| s.is_active())
            .map(|s| s.clone()))
    }

    async fn close_and_release(
        &self,
        session_id: i32,
        exit: ExitRecord,
    ) -> DomainResult<ParkingSession> {
        let closed = {
            let mut session = self
                .sessions
                .get_mut(&session_id)
                .ok_or_else(|| Self::session_not_found(session_id))?;
            if !session.is_active() {
                return Err(DomainError::NoActiveSession {
                    lot_id: session.lot_id,
                    plate: session.plate.to_string(),
                });
            }
            session.record_exit(&exit)?;
            session.clone()
        };

        self.active_by_plate.remove_if(
            &(closed.lot_id, closed.plate.as_str().to_string()),
            |_, id| *id == session_id,
        );

        if let Err(e) = self.release(closed.lot_id, closed.slot_id).await {
            error!(
                session_id,
                lot_id = closed.lot_id,
                slot_id = closed.slot_id,
                error = %e,
                "Slot of closing session was not occupied"
            );
        }

        Ok(closed)
    }

    async fn begin_payment(
        &self,
        session_id: i32,
        attempt: PaymentAttempt,
    ) -> DomainResult<ParkingSession> {
        let mut session = self
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| Self::session_not_found(session_id))?;
        if self.attempts.contains_key(&attempt.reference) {
            return Err(DomainError::Conflict(format!(
                "Payment reference {} is already recorded",
                attempt.reference
            )));
        }
        session.begin_payment(&attempt)?;
        self.attempts.insert(attempt.reference.clone(), attempt);
        Ok(session.clone())
    }

    async fn record_rejected_attempt(
        &self,
        session_id: i32,
        attempt_no: u32,
        at: DateTime<Utc>,
    ) -> DomainResult<ParkingSession> {
        let mut session = self
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| Self::session_not_found(session_id))?;
        session.record_rejected_attempt(attempt_no, at)?;
        Ok(session.clone())
    }

    async fn settle_payment(
        &self,
        reference: &str,
        outcome: GatewayStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<Settlement> {
        let session_id = self
            .attempts
            .get(reference)
            .map(|a| a.session_id)
            .ok_or_else(|| DomainError::NotFound {
                entity: "PaymentAttempt",
                field: "reference",
                value: reference.to_string(),
            })?;

        let mut session = self
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| Self::session_not_found(session_id))?;
        if let Some(mut attempt) = self.attempts.get_mut(reference) {
            attempt.resolve(&outcome, at);
        }

        let applied = session.settle(reference, &outcome, at);
        if applied && session.status == SessionStatus::Paid {
            let day = session.exit_time.unwrap_or(at).date_naive();
            let fee = session.fee.unwrap_or_default();
            let mut income = self
                .income
                .entry((session.lot_id, day))
                .or_insert_with(|| DailyIncome::empty(session.lot_id, day));
            income.total += fee;
            income.payments += 1;
        }

        Ok(Settlement {
            session: session.clone(),
            applied,
        })
    }

    async fn find_attempt(&self, reference: &str) -> DomainResult<Option<PaymentAttempt>> {
        Ok(self.attempts.get(reference).map(|a| a.clone()))
    }

    async fn attempts_for_session(&self, session_id: i32) -> DomainResult<Vec<PaymentAttempt>> {
        let mut attempts: Vec<_> = self
            .attempts
            .iter()
            .filter(|a| a.session_id == session_id)
            .map(|a| a.value().clone())
            .collect();
        attempts.sort_by_key(|a| a.attempt_no);
        Ok(attempts)
    }

    async fn find_pending_payments(
        &self,
        lot_id: Option<i32>,
    ) -> DomainResult<Vec<ParkingSession>> {
        let mut pending: Vec<_> = self
            .sessions
            .iter()
            .filter(|s| s.status == SessionStatus::PaymentPending)
            .filter(|s| lot_id.map_or(true, |lot| s.lot_id == lot))
            .map(|s| s.value().clone())
            .collect();
        pending.sort_by_key(|s| s.id);
        Ok(pending)
    }
}
