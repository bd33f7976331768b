//! Parking lot repository interface

use async_trait::async_trait;
use chrono::NaiveDate;

use super::model::{DailyIncome, NewLot, ParkingLot, RateChange};
use crate::domain::DomainResult;

#[async_trait]
pub trait LotRepository: Send + Sync {
    /// Create a lot, its first rate and all of its slots in one transaction.
    async fn create(&self, lot: NewLot) -> DomainResult<ParkingLot>;

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<ParkingLot>>;

    async fn find_all(&self) -> DomainResult<Vec<ParkingLot>>;

    /// Append to the rate history. Existing entries are never modified.
    async fn append_rate(&self, lot_id: i32, change: RateChange) -> DomainResult<()>;

    async fn income_for_day(&self, lot_id: i32, day: NaiveDate) -> DomainResult<DailyIncome>;
}
