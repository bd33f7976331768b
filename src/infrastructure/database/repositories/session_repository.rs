//! SeaORM implementation of SessionRepository
//!
//! Composite changes (close + release, begin payment + attempt row,
//! settle + income) run in one `DatabaseTransaction`. Validation reads happen
//! before it; the first statement inside is always the conditional update, so
//! the transaction holds SQLite's write lock before it reads anything and
//! waits out other writers instead of failing with `SQLITE_BUSY`. A caller
//! that lost a race sees `rows_affected == 0` and backs out.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, NotSet,
    QueryFilter, QueryOrder, Set, TransactionTrait, UpdateResult,
};
use tracing::{debug, error};

use super::convert::{corrupt, db_err, decimal, opt_decimal, unique_violation};
use super::slot_store::release_slot;
use crate::domain::{
    AttemptStatus, DomainError, DomainResult, ExitRecord, GatewayStatus, NewSession,
    ParkingSession, PaymentAttempt, Plate, SessionRepository, SessionStatus, Settlement,
    VehicleCategory,
};
use crate::infrastructure::database::entities::{lot_income, parking_session, payment_attempt};

pub struct SeaOrmSessionRepository {
    db: DatabaseConnection,
}

impl SeaOrmSessionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: parking_session::Model) -> DomainResult<ParkingSession> {
    let status = SessionStatus::from_str(&m.status)
        .ok_or_else(|| corrupt("parking_sessions.status", &m.status))?;
    Ok(ParkingSession {
        id: m.id,
        lot_id: m.lot_id,
        slot_id: m.slot_id,
        plate: Plate::parse(&m.plate)?,
        category: VehicleCategory::parse(&m.category)?,
        entry_time: m.entry_time,
        exit_time: m.exit_time,
        fee: opt_decimal("parking_sessions.fee", m.fee.as_deref())?,
        rate_per_minute: opt_decimal(
            "parking_sessions.rate_per_minute",
            m.rate_per_minute.as_deref(),
        )?,
        payment_ref: m.payment_ref,
        payment_attempts: m.payment_attempts.max(0) as u32,
        status,
        recorded_by: m.recorded_by,
        updated_at: m.updated_at,
    })
}

fn attempt_to_domain(m: payment_attempt::Model) -> DomainResult<PaymentAttempt> {
    let status = AttemptStatus::from_str(&m.status)
        .ok_or_else(|| corrupt("payment_attempts.status", &m.status))?;
    Ok(PaymentAttempt {
        amount: decimal("payment_attempts.amount", &m.amount)?,
        reference: m.reference,
        session_id: m.session_id,
        attempt_no: m.attempt_no.max(0) as u32,
        idempotency_key: m.idempotency_key,
        phone: m.phone,
        status,
        gateway_status: m.gateway_status,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn session_not_found(id: i32) -> DomainError {
    DomainError::NotFound {
        entity: "ParkingSession",
        field: "id",
        value: id.to_string(),
    }
}

fn session_status_strs(statuses: &[SessionStatus]) -> Vec<&'static str> {
    statuses.iter().map(|s| s.as_str()).collect()
}

async fn load_session<C: ConnectionTrait>(conn: &C, id: i32) -> DomainResult<ParkingSession> {
    let model = parking_session::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| session_not_found(id))?;
    model_to_domain(model)
}

/// Add one paid fee to the lot's income for `day`.
async fn add_income<C: ConnectionTrait>(
    conn: &C,
    lot_id: i32,
    day: NaiveDate,
    fee: Decimal,
) -> DomainResult<()> {
    let existing = lot_income::Entity::find_by_id((lot_id, day))
        .one(conn)
        .await
        .map_err(db_err)?;

    match existing {
        Some(row) => {
            let total = decimal("lot_income.total", &row.total)? + fee;
            let payments = row.payments + 1;
            let mut active: lot_income::ActiveModel = row.into();
            active.total = Set(total.to_string());
            active.payments = Set(payments);
            active.update(conn).await.map_err(db_err)?;
        }
        None => {
            lot_income::Entity::insert(lot_income::ActiveModel {
                lot_id: Set(lot_id),
                day: Set(day),
                total: Set(fee.to_string()),
                payments: Set(1),
            })
            .exec_without_returning(conn)
            .await
            .map_err(db_err)?;
        }
    }
    Ok(())
}

// ── SessionRepository impl ──────────────────────────────────────

#[async_trait]
impl SessionRepository for SeaOrmSessionRepository {
    async fn open(&self, session: NewSession) -> DomainResult<ParkingSession> {
        debug!(
            lot_id = session.lot_id,
            slot_id = session.slot_id,
            plate = %session.plate,
            "Opening session"
        );

        let model = parking_session::ActiveModel {
            id: NotSet,
            lot_id: Set(session.lot_id),
            slot_id: Set(session.slot_id),
            plate: Set(session.plate.as_str().to_string()),
            category: Set(session.category.as_str().to_string()),
            entry_time: Set(session.entry_time),
            exit_time: Set(None),
            fee: Set(None),
            rate_per_minute: Set(None),
            payment_ref: Set(None),
            payment_attempts: Set(0),
            status: Set(SessionStatus::Active.as_str().to_string()),
            recorded_by: Set(session.recorded_by.clone()),
            updated_at: Set(session.entry_time),
        };

        match model.insert(&self.db).await {
            Ok(inserted) => model_to_domain(inserted),
            Err(e) => match unique_violation(&e) {
                Some(msg) if msg.contains("plate") => Err(DomainError::PlateAlreadyParked {
                    lot_id: session.lot_id,
                    plate: session.plate.to_string(),
                }),
                Some(_) => Err(DomainError::SlotOccupied {
                    lot_id: session.lot_id,
                    slot_id: session.slot_id,
                }),
                None => Err(db_err(e)),
            },
        }
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<ParkingSession>> {
        parking_session::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_active_by_plate(
        &self,
        lot_id: i32,
        plate: &str,
    ) -> DomainResult<Option<ParkingSession>> {
        parking_session::Entity::find()
            .filter(parking_session::Column::LotId.eq(lot_id))
            .filter(parking_session::Column::Plate.eq(plate))
            .filter(parking_session::Column::Status.eq(SessionStatus::Active.as_str()))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn close_and_release(
        &self,
        session_id: i32,
        exit: ExitRecord,
    ) -> DomainResult<ParkingSession> {
        let session = load_session(&self.db, session_id).await?;
        let no_active = || DomainError::NoActiveSession {
            lot_id: session.lot_id,
            plate: session.plate.to_string(),
        };
        if !session.is_active() {
            return Err(no_active());
        }
        let closed = {
            let mut next = session.clone();
            next.record_exit(&exit)?;
            next
        };

        let txn = self.db.begin().await.map_err(db_err)?;

        let result: UpdateResult = parking_session::Entity::update_many()
            .col_expr(
                parking_session::Column::Status,
                Expr::value(SessionStatus::AwaitingPayment.as_str()),
            )
            .col_expr(
                parking_session::Column::ExitTime,
                Expr::value(Some(exit.exit_time)),
            )
            .col_expr(
                parking_session::Column::Fee,
                Expr::value(Some(exit.fee.to_string())),
            )
            .col_expr(
                parking_session::Column::RatePerMinute,
                Expr::value(Some(exit.rate_per_minute.to_string())),
            )
            .col_expr(parking_session::Column::UpdatedAt, Expr::value(exit.exit_time))
            .filter(parking_session::Column::Id.eq(session_id))
            .filter(parking_session::Column::Status.eq(SessionStatus::Active.as_str()))
            .filter(parking_session::Column::Fee.is_null())
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if result.rows_affected != 1 {
            return Err(no_active());
        }

        let released = release_slot(&txn, session.lot_id, session.slot_id)
            .await
            .map_err(db_err)?;
        if !released {
            error!(
                session_id,
                lot_id = session.lot_id,
                slot_id = session.slot_id,
                "Slot of closing session was not occupied"
            );
        }

        txn.commit().await.map_err(db_err)?;
        Ok(closed)
    }

    async fn begin_payment(
        &self,
        session_id: i32,
        attempt: PaymentAttempt,
    ) -> DomainResult<ParkingSession> {
        let mut session = load_session(&self.db, session_id).await?;
        session.begin_payment(&attempt)?;

        let txn = self.db.begin().await.map_err(db_err)?;

        let result: UpdateResult = parking_session::Entity::update_many()
            .col_expr(
                parking_session::Column::Status,
                Expr::value(SessionStatus::PaymentPending.as_str()),
            )
            .col_expr(
                parking_session::Column::PaymentRef,
                Expr::value(Some(attempt.reference.clone())),
            )
            .col_expr(
                parking_session::Column::PaymentAttempts,
                Expr::value(attempt.attempt_no as i32),
            )
            .col_expr(
                parking_session::Column::UpdatedAt,
                Expr::value(attempt.created_at),
            )
            .filter(parking_session::Column::Id.eq(session_id))
            .filter(
                parking_session::Column::Status
                    .is_in(session_status_strs(&SessionStatus::PAYABLE)),
            )
            .filter(parking_session::Column::PaymentAttempts.eq(attempt.attempt_no as i32 - 1))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if result.rows_affected != 1 {
            return Err(DomainError::Conflict(format!(
                "Session {} attempt {} was already recorded",
                session_id, attempt.attempt_no
            )));
        }

        let row = payment_attempt::ActiveModel {
            reference: Set(attempt.reference.clone()),
            session_id: Set(attempt.session_id),
            attempt_no: Set(attempt.attempt_no as i32),
            idempotency_key: Set(attempt.idempotency_key.clone()),
            amount: Set(attempt.amount.to_string()),
            phone: Set(attempt.phone.clone()),
            status: Set(attempt.status.as_str().to_string()),
            gateway_status: Set(attempt.gateway_status.clone()),
            created_at: Set(attempt.created_at),
            updated_at: Set(attempt.updated_at),
        };
        if let Err(e) = payment_attempt::Entity::insert(row)
            .exec_without_returning(&txn)
            .await
        {
            return Err(match unique_violation(&e) {
                Some(_) => DomainError::Conflict(format!(
                    "Payment reference {} is already recorded",
                    attempt.reference
                )),
                None => db_err(e),
            });
        }

        txn.commit().await.map_err(db_err)?;
        Ok(session)
    }

    async fn record_rejected_attempt(
        &self,
        session_id: i32,
        attempt_no: u32,
        at: DateTime<Utc>,
    ) -> DomainResult<ParkingSession> {
        let result: UpdateResult = parking_session::Entity::update_many()
            .col_expr(
                parking_session::Column::PaymentAttempts,
                Expr::value(attempt_no as i32),
            )
            .col_expr(parking_session::Column::UpdatedAt, Expr::value(at))
            .filter(parking_session::Column::Id.eq(session_id))
            .filter(
                parking_session::Column::Status
                    .is_in(session_status_strs(&SessionStatus::PAYABLE)),
            )
            .filter(parking_session::Column::PaymentAttempts.eq(attempt_no as i32 - 1))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        let mut session = load_session(&self.db, session_id).await?;
        if result.rows_affected == 1 {
            return Ok(session);
        }
        // Lost the swap: let the domain rule name the reason.
        session.record_rejected_attempt(attempt_no, at)?;
        Err(DomainError::Conflict(format!(
            "Session {} attempt {} was already recorded",
            session_id, attempt_no
        )))
    }

    async fn settle_payment(
        &self,
        reference: &str,
        outcome: GatewayStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<Settlement> {
        let attempt = self
            .find_attempt(reference)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "PaymentAttempt",
                field: "reference",
                value: reference.to_string(),
            })?;

        let Some(attempt_status) = AttemptStatus::settled_by(&outcome) else {
            let session = load_session(&self.db, attempt.session_id).await?;
            return Ok(Settlement {
                session,
                applied: false,
            });
        };

        let txn = self.db.begin().await.map_err(db_err)?;

        // Resolves the attempt only while it is still pending.
        payment_attempt::Entity::update_many()
            .col_expr(
                payment_attempt::Column::Status,
                Expr::value(attempt_status.as_str()),
            )
            .col_expr(
                payment_attempt::Column::GatewayStatus,
                Expr::value(Some(outcome.as_str().to_string())),
            )
            .col_expr(payment_attempt::Column::UpdatedAt, Expr::value(at))
            .filter(payment_attempt::Column::Reference.eq(reference))
            .filter(payment_attempt::Column::Status.eq(AttemptStatus::Pending.as_str()))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        let mut session = load_session(&txn, attempt.session_id).await?;
        let mut applied = false;
        if session.settle(reference, &outcome, at) {
            let result: UpdateResult = parking_session::Entity::update_many()
                .col_expr(
                    parking_session::Column::Status,
                    Expr::value(session.status.as_str()),
                )
                .col_expr(parking_session::Column::UpdatedAt, Expr::value(at))
                .filter(parking_session::Column::Id.eq(session.id))
                .filter(
                    parking_session::Column::Status.eq(SessionStatus::PaymentPending.as_str()),
                )
                .filter(parking_session::Column::PaymentRef.eq(reference))
                .exec(&txn)
                .await
                .map_err(db_err)?;
            applied = result.rows_affected == 1;

            if applied && session.status == SessionStatus::Paid {
                let day = session.exit_time.unwrap_or(at).date_naive();
                add_income(&txn, session.lot_id, day, session.fee.unwrap_or_default()).await?;
            }
            if !applied {
                session = load_session(&txn, session.id).await?;
            }
        }

        txn.commit().await.map_err(db_err)?;
        Ok(Settlement { session, applied })
    }

    async fn find_attempt(&self, reference: &str) -> DomainResult<Option<PaymentAttempt>> {
        payment_attempt::Entity::find_by_id(reference.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(attempt_to_domain)
            .transpose()
    }

    async fn attempts_for_session(&self, session_id: i32) -> DomainResult<Vec<PaymentAttempt>> {
        payment_attempt::Entity::find()
            .filter(payment_attempt::Column::SessionId.eq(session_id))
            .order_by_asc(payment_attempt::Column::AttemptNo)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(attempt_to_domain)
            .collect()
    }

    async fn find_pending_payments(
        &self,
        lot_id: Option<i32>,
    ) -> DomainResult<Vec<ParkingSession>> {
        let mut query = parking_session::Entity::find()
            .filter(parking_session::Column::Status.eq(SessionStatus::PaymentPending.as_str()));
        if let Some(lot_id) = lot_id {
            query = query.filter(parking_session::Column::LotId.eq(lot_id));
        }
        query
            .order_by_asc(parking_session::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }
}
