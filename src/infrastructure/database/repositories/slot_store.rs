//! SeaORM implementation of SlotStore
//!
//! Every state change is a single conditional `UPDATE ... WHERE status = ?`
//! on one row; `rows_affected` tells the caller whether it won the race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    UpdateResult,
};
use tracing::debug;

use super::convert::{corrupt, db_err};
use crate::domain::{
    DomainError, DomainResult, Occupant, Plate, Slot, SlotStatus, SlotStore, VehicleCategory,
};
use crate::infrastructure::database::entities::{lot, slot};

/// Lost races tolerated by a no-preference reservation before giving up.
const MAX_CLAIM_RACES: usize = 64;

pub struct SeaOrmSlotStore {
    db: DatabaseConnection,
}

impl SeaOrmSlotStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn slot_exists(&self, lot_id: i32, slot_id: i32) -> DomainResult<bool> {
        Ok(slot::Entity::find_by_id((lot_id, slot_id))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .is_some())
    }
}

/// Available -> Occupied for one slot. True when this call made the change.
pub(super) async fn claim_slot<C: ConnectionTrait>(
    conn: &C,
    lot_id: i32,
    slot_id: i32,
    occupant: &Occupant,
    at: DateTime<Utc>,
) -> Result<bool, DbErr> {
    let result: UpdateResult = slot::Entity::update_many()
        .col_expr(
            slot::Column::Status,
            Expr::value(SlotStatus::Occupied.as_str()),
        )
        .col_expr(
            slot::Column::Plate,
            Expr::value(Some(occupant.plate.as_str().to_string())),
        )
        .col_expr(
            slot::Column::Category,
            Expr::value(Some(occupant.category.as_str().to_string())),
        )
        .col_expr(slot::Column::OccupiedSince, Expr::value(Some(at)))
        .filter(slot::Column::LotId.eq(lot_id))
        .filter(slot::Column::SlotNumber.eq(slot_id))
        .filter(slot::Column::Status.eq(SlotStatus::Available.as_str()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Occupied -> Available for one slot. True when this call made the change.
pub(super) async fn release_slot<C: ConnectionTrait>(
    conn: &C,
    lot_id: i32,
    slot_id: i32,
) -> Result<bool, DbErr> {
    let result: UpdateResult = slot::Entity::update_many()
        .col_expr(
            slot::Column::Status,
            Expr::value(SlotStatus::Available.as_str()),
        )
        .col_expr(slot::Column::Plate, Expr::value(Option::<String>::None))
        .col_expr(slot::Column::Category, Expr::value(Option::<String>::None))
        .col_expr(
            slot::Column::OccupiedSince,
            Expr::value(Option::<DateTime<Utc>>::None),
        )
        .filter(slot::Column::LotId.eq(lot_id))
        .filter(slot::Column::SlotNumber.eq(slot_id))
        .filter(slot::Column::Status.eq(SlotStatus::Occupied.as_str()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: slot::Model) -> DomainResult<Slot> {
    let status =
        SlotStatus::from_str(&m.status).ok_or_else(|| corrupt("slots.status", &m.status))?;
    let occupant = match (m.plate, m.category) {
        (Some(plate), Some(category)) => Some(Occupant {
            plate: Plate::parse(&plate)?,
            category: VehicleCategory::parse(&category)?,
        }),
        _ => None,
    };
    Ok(Slot {
        lot_id: m.lot_id,
        number: m.slot_number,
        status,
        occupant,
        occupied_since: m.occupied_since,
    })
}

// ── SlotStore impl ──────────────────────────────────────────────

#[async_trait]
impl SlotStore for SeaOrmSlotStore {
    async fn reserve(
        &self,
        lot_id: i32,
        occupant: &Occupant,
        desired: Option<i32>,
        at: DateTime<Utc>,
    ) -> DomainResult<i32> {
        if let Some(slot_id) = desired {
            if claim_slot(&self.db, lot_id, slot_id, occupant, at)
                .await
                .map_err(db_err)?
            {
                return Ok(slot_id);
            }
            return if self.slot_exists(lot_id, slot_id).await? {
                Err(DomainError::SlotOccupied { lot_id, slot_id })
            } else {
                Err(DomainError::SlotNotFound { lot_id, slot_id })
            };
        }

        for _ in 0..MAX_CLAIM_RACES {
            let candidate = slot::Entity::find()
                .filter(slot::Column::LotId.eq(lot_id))
                .filter(slot::Column::Status.eq(SlotStatus::Available.as_str()))
                .order_by_asc(slot::Column::SlotNumber)
                .one(&self.db)
                .await
                .map_err(db_err)?;

            let Some(candidate) = candidate else {
                let lot_exists = lot::Entity::find_by_id(lot_id)
                    .one(&self.db)
                    .await
                    .map_err(db_err)?
                    .is_some();
                return if lot_exists {
                    Err(DomainError::LotFull(lot_id))
                } else {
                    Err(DomainError::NotFound {
                        entity: "ParkingLot",
                        field: "id",
                        value: lot_id.to_string(),
                    })
                };
            };

            if claim_slot(&self.db, lot_id, candidate.slot_number, occupant, at)
                .await
                .map_err(db_err)?
            {
                return Ok(candidate.slot_number);
            }
            debug!(lot_id, slot_id = candidate.slot_number, "Lost slot race, retrying");
        }

        Err(DomainError::Conflict(format!(
            "Could not claim a slot in lot {} under contention",
            lot_id
        )))
    }

    async fn release(&self, lot_id: i32, slot_id: i32) -> DomainResult<()> {
        if release_slot(&self.db, lot_id, slot_id)
            .await
            .map_err(db_err)?
        {
            return Ok(());
        }
        if self.slot_exists(lot_id, slot_id).await? {
            Err(DomainError::SlotNotOccupied { lot_id, slot_id })
        } else {
            Err(DomainError::SlotNotFound { lot_id, slot_id })
        }
    }

    async fn list_for_lot(&self, lot_id: i32) -> DomainResult<Vec<Slot>> {
        slot::Entity::find()
            .filter(slot::Column::LotId.eq(lot_id))
            .order_by_asc(slot::Column::SlotNumber)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }
}
