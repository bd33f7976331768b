//! Parking DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::domain::{DailyIncome, ParkingSession, Slot};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ParkRequest {
    /// Plate as typed by the manager; spaces and case are normalized.
    #[validate(length(min = 1, max = 32))]
    pub plate: String,
    /// Vehicle category, e.g. `Sedan`, `SUV`, `Motorcycle`.
    #[validate(length(min = 1, max = 32))]
    pub category: String,
    /// Explicit slot. The lowest available slot is used when absent.
    #[validate(range(min = 1))]
    pub slot_id: Option<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ExitRequest {
    #[validate(length(min = 1, max = 32))]
    pub plate: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionDto {
    pub id: i32,
    pub lot_id: i32,
    pub slot_id: i32,
    pub plate: String,
    pub category: String,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, example = "50.001")]
    pub fee: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub rate_per_minute: Option<Decimal>,
    pub payment_ref: Option<String>,
    pub payment_attempts: u32,
    pub status: String,
    pub recorded_by: String,
    pub updated_at: DateTime<Utc>,
}

impl From<ParkingSession> for SessionDto {
    fn from(s: ParkingSession) -> Self {
        Self {
            id: s.id,
            lot_id: s.lot_id,
            slot_id: s.slot_id,
            plate: s.plate.to_string(),
            category: s.category.to_string(),
            entry_time: s.entry_time,
            exit_time: s.exit_time,
            fee: s.fee,
            rate_per_minute: s.rate_per_minute,
            payment_ref: s.payment_ref,
            payment_attempts: s.payment_attempts,
            status: s.status.to_string(),
            recorded_by: s.recorded_by,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SlotDto {
    pub number: i32,
    pub status: String,
    pub plate: Option<String>,
    pub category: Option<String>,
    pub occupied_since: Option<DateTime<Utc>>,
}

impl From<Slot> for SlotDto {
    fn from(s: Slot) -> Self {
        Self {
            number: s.number,
            status: s.status.to_string(),
            plate: s.occupant.as_ref().map(|o| o.plate.to_string()),
            category: s.occupant.as_ref().map(|o| o.category.to_string()),
            occupied_since: s.occupied_since,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SlotSummaryDto {
    pub total: usize,
    pub available: usize,
    pub occupied: usize,
    pub slots: Vec<SlotDto>,
}

impl From<Vec<Slot>> for SlotSummaryDto {
    fn from(slots: Vec<Slot>) -> Self {
        let available = slots.iter().filter(|s| s.is_available()).count();
        Self {
            total: slots.len(),
            available,
            occupied: slots.len() - available,
            slots: slots.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct IncomeQuery {
    /// Day to report, `YYYY-MM-DD`. Defaults to today (UTC).
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IncomeDto {
    pub lot_id: i32,
    pub day: NaiveDate,
    #[schema(value_type = String, example = "1250.50")]
    pub total: Decimal,
    pub payments: u32,
}

impl From<DailyIncome> for IncomeDto {
    fn from(i: DailyIncome) -> Self {
        Self {
            lot_id: i.lot_id,
            day: i.day,
            total: i.total,
            payments: i.payments,
        }
    }
}
