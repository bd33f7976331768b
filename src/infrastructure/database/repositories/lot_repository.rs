//! SeaORM implementation of LotRepository

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::debug;

use super::convert::{db_err, decimal};
use crate::domain::{
    DailyIncome, DomainError, DomainResult, LotRepository, NewLot, ParkingLot, RateChange,
    SlotStatus,
};
use crate::infrastructure::database::entities::{lot, lot_income, lot_rate, slot};

/// Rows per multi-row slot insert. Keeps statements well under SQLite's
/// bound-parameter limit.
const SLOT_INSERT_CHUNK: usize = 500;

pub struct SeaOrmLotRepository {
    db: DatabaseConnection,
}

impl SeaOrmLotRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn rates_for(&self, lot_id: i32) -> DomainResult<Vec<RateChange>> {
        let rows = lot_rate::Entity::find()
            .filter(lot_rate::Column::LotId.eq(lot_id))
            .order_by_asc(lot_rate::Column::EffectiveFrom)
            .order_by_asc(lot_rate::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(rate_to_domain).collect()
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn rate_to_domain(m: lot_rate::Model) -> DomainResult<RateChange> {
    Ok(RateChange {
        rate_per_minute: decimal("lot_rates.rate_per_minute", &m.rate_per_minute)?,
        effective_from: m.effective_from,
    })
}

fn model_to_domain(m: lot::Model, rates: Vec<RateChange>) -> ParkingLot {
    ParkingLot {
        id: m.id,
        name: m.name,
        total_slots: m.total_slots,
        rates,
        created_at: m.created_at,
    }
}

fn lot_not_found(id: i32) -> DomainError {
    DomainError::NotFound {
        entity: "ParkingLot",
        field: "id",
        value: id.to_string(),
    }
}

// ── LotRepository impl ──────────────────────────────────────────

#[async_trait]
impl LotRepository for SeaOrmLotRepository {
    async fn create(&self, new: NewLot) -> DomainResult<ParkingLot> {
        debug!(name = %new.name, slots = new.slots.get(), "Creating lot");

        let txn = self.db.begin().await.map_err(db_err)?;

        let created = lot::ActiveModel {
            id: NotSet,
            name: Set(new.name.clone()),
            total_slots: Set(new.slots.get()),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        lot_rate::ActiveModel {
            id: NotSet,
            lot_id: Set(created.id),
            rate_per_minute: Set(new.rate_per_minute.to_string()),
            effective_from: Set(new.effective_from),
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        let numbers: Vec<i32> = new.slots.numbers().collect();
        for chunk in numbers.chunks(SLOT_INSERT_CHUNK) {
            let rows = chunk.iter().map(|&n| slot::ActiveModel {
                lot_id: Set(created.id),
                slot_number: Set(n),
                status: Set(SlotStatus::Available.as_str().to_string()),
                plate: Set(None),
                category: Set(None),
                occupied_since: Set(None),
            });
            slot::Entity::insert_many(rows)
                .exec_without_returning(&txn)
                .await
                .map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)?;

        let rates = vec![RateChange {
            rate_per_minute: new.rate_per_minute,
            effective_from: new.effective_from,
        }];
        Ok(model_to_domain(created, rates))
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<ParkingLot>> {
        let model = lot::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        match model {
            Some(m) => {
                let rates = self.rates_for(m.id).await?;
                Ok(Some(model_to_domain(m, rates)))
            }
            None => Ok(None),
        }
    }

    async fn find_all(&self) -> DomainResult<Vec<ParkingLot>> {
        let models = lot::Entity::find()
            .order_by_asc(lot::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut lots = Vec::with_capacity(models.len());
        for m in models {
            let rates = self.rates_for(m.id).await?;
            lots.push(model_to_domain(m, rates));
        }
        Ok(lots)
    }

    async fn append_rate(&self, lot_id: i32, change: RateChange) -> DomainResult<()> {
        debug!(lot_id, rate = %change.rate_per_minute, "Appending rate");

        let lot = lot::Entity::find_by_id(lot_id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| lot_not_found(lot_id))?;

        // Insert first so the transaction owns the write lock while it
        // reads the history.
        let txn = self.db.begin().await.map_err(db_err)?;
        let inserted = lot_rate::ActiveModel {
            id: NotSet,
            lot_id: Set(lot_id),
            rate_per_minute: Set(change.rate_per_minute.to_string()),
            effective_from: Set(change.effective_from),
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        let rates = lot_rate::Entity::find()
            .filter(lot_rate::Column::LotId.eq(lot_id))
            .filter(lot_rate::Column::Id.ne(inserted.id))
            .order_by_asc(lot_rate::Column::EffectiveFrom)
            .order_by_asc(lot_rate::Column::Id)
            .all(&txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(rate_to_domain)
            .collect::<DomainResult<Vec<_>>>()?;
        if let Err(e) = model_to_domain(lot, rates).validate_rate_change(&change) {
            txn.rollback().await.map_err(db_err)?;
            return Err(e);
        }

        txn.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn income_for_day(&self, lot_id: i32, day: NaiveDate) -> DomainResult<DailyIncome> {
        let row = lot_income::Entity::find_by_id((lot_id, day))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        match row {
            Some(m) => Ok(DailyIncome {
                lot_id,
                day,
                total: decimal("lot_income.total", &m.total)?,
                payments: m.payments.max(0) as u32,
            }),
            None => Ok(DailyIncome::empty(lot_id, day)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::repositories::test_db;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use sea_orm::PaginatorTrait;

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn create_persists_lot_rate_and_slots() {
        let db = test_db().await;
        let repo = SeaOrmLotRepository::new(db.clone());

        let lot = repo
            .create(NewLot::new("Kigali Heights", 1_201, dec!(12.5), t0()).unwrap())
            .await
            .unwrap();

        let slots = slot::Entity::find()
            .filter(slot::Column::LotId.eq(lot.id))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(slots, 1_201);

        let loaded = repo.find_by_id(lot.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Kigali Heights");
        assert_eq!(loaded.total_slots, 1_201);
        assert_eq!(loaded.rate_at(t0()), Some(dec!(12.5)));
    }

    #[tokio::test]
    async fn append_rate_keeps_history_and_rejects_backdating() {
        let db = test_db().await;
        let repo = SeaOrmLotRepository::new(db);
        let lot = repo
            .create(NewLot::new("Lot", 2, dec!(10), t0()).unwrap())
            .await
            .unwrap();

        repo.append_rate(
            lot.id,
            RateChange {
                rate_per_minute: dec!(15),
                effective_from: t0() + Duration::hours(2),
            },
        )
        .await
        .unwrap();

        let backdated = repo
            .append_rate(
                lot.id,
                RateChange {
                    rate_per_minute: dec!(20),
                    effective_from: t0() + Duration::hours(1),
                },
            )
            .await;
        assert!(matches!(backdated, Err(DomainError::Validation(_))));

        let loaded = repo.find_by_id(lot.id).await.unwrap().unwrap();
        assert_eq!(loaded.rates.len(), 2);
        assert_eq!(loaded.rate_at(t0() + Duration::minutes(30)), Some(dec!(10)));
        assert_eq!(loaded.rate_at(t0() + Duration::hours(3)), Some(dec!(15)));
    }

    #[tokio::test]
    async fn append_rate_to_unknown_lot() {
        let db = test_db().await;
        let repo = SeaOrmLotRepository::new(db);
        let result = repo
            .append_rate(
                99,
                RateChange {
                    rate_per_minute: dec!(1),
                    effective_from: t0(),
                },
            )
            .await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn income_defaults_to_zero() {
        let db = test_db().await;
        let repo = SeaOrmLotRepository::new(db);
        let day = t0().date_naive();
        let income = repo.income_for_day(1, day).await.unwrap();
        assert_eq!(income, DailyIncome::empty(1, day));
    }
}
