//! Lot administration used for seeding and rate changes

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;

use crate::domain::{DomainError, DomainResult, NewLot, ParkingLot, RateChange, RepositoryProvider};

pub struct LotService {
    repos: Arc<dyn RepositoryProvider>,
}

impl LotService {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    /// Create a lot with `slots` numbered slots and its first rate.
    pub async fn create_lot(
        &self,
        name: &str,
        slots: i32,
        rate_per_minute: Decimal,
        effective_from: DateTime<Utc>,
    ) -> DomainResult<ParkingLot> {
        let new_lot = NewLot::new(name, slots, rate_per_minute, effective_from)?;
        let lot = self.repos.lots().create(new_lot).await?;
        info!(
            lot_id = lot.id,
            name = %lot.name,
            slots = lot.total_slots,
            rate = %rate_per_minute,
            "Parking lot created"
        );
        Ok(lot)
    }

    /// Append a rate to the lot's history. Past entries are never changed.
    pub async fn change_rate(
        &self,
        lot_id: i32,
        rate_per_minute: Decimal,
        effective_from: DateTime<Utc>,
    ) -> DomainResult<ParkingLot> {
        let lot = self
            .repos
            .lots()
            .find_by_id(lot_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "ParkingLot",
                field: "id",
                value: lot_id.to_string(),
            })?;
        let change = RateChange {
            rate_per_minute,
            effective_from,
        };
        lot.validate_rate_change(&change)?;
        self.repos.lots().append_rate(lot_id, change).await?;
        info!(lot_id, rate = %rate_per_minute, effective_from = %effective_from, "Lot rate changed");

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

    pub async fn list_lots(&self) -> DomainResult<Vec<ParkingLot>> {
        self.repos.lots().find_all().await
    }
}
