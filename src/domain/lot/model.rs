//! Parking lot domain entity

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::shared::errors::DomainError;

/// Upper bound on slots created for a single lot.
pub const MAX_SLOTS_PER_LOT: i32 = 10_000;

/// One entry of a lot's rate history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateChange {
    pub rate_per_minute: Decimal,
    pub effective_from: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ParkingLot {
    pub id: i32,
    pub name: String,
    pub total_slots: i32,
    /// Ordered by `effective_from`, oldest first. Never empty for a stored lot.
    pub rates: Vec<RateChange>,
    pub created_at: DateTime<Utc>,
}

impl ParkingLot {
    /// Rate in force at `at`. Instants before the first entry use the first
    /// entry, so a lot always has a price.
    pub fn rate_at(&self, at: DateTime<Utc>) -> Option<Decimal> {
        self.rates
            .iter()
            .rev()
            .find(|r| r.effective_from <= at)
            .or_else(|| self.rates.first())
            .map(|r| r.rate_per_minute)
    }

    pub fn latest_rate(&self) -> Option<&RateChange> {
        self.rates.last()
    }

    /// Check that `change` may be appended to the history.
    pub fn validate_rate_change(&self, change: &RateChange) -> Result<(), DomainError> {
        validate_rate(change.rate_per_minute)?;
        if let Some(latest) = self.latest_rate() {
            if change.effective_from < latest.effective_from {
                return Err(DomainError::Validation(format!(
                    "Rate change effective {} predates the current rate ({})",
                    change.effective_from, latest.effective_from
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_rate(rate: Decimal) -> Result<(), DomainError> {
    if rate.is_sign_negative() {
        return Err(DomainError::Validation(format!(
            "Rate per minute must not be negative, got {}",
            rate
        )));
    }
    Ok(())
}

/// Validated number of slots to create for a lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCount(i32);

impl SlotCount {
    pub fn new(count: i32) -> Result<Self, DomainError> {
        if !(1..=MAX_SLOTS_PER_LOT).contains(&count) {
            return Err(DomainError::Validation(format!(
                "Slot count must be between 1 and {}, got {}",
                MAX_SLOTS_PER_LOT, count
            )));
        }
        Ok(Self(count))
    }

    pub fn get(self) -> i32 {
        self.0
    }

    /// Slot numbers 1..=count.
    pub fn numbers(self) -> impl Iterator<Item = i32> {
        1..=self.0
    }
}

/// Input for creating a lot together with its slots and first rate.
#[derive(Debug, Clone)]
pub struct NewLot {
    pub name: String,
    pub slots: SlotCount,
    pub rate_per_minute: Decimal,
    pub effective_from: DateTime<Utc>,
}

impl NewLot {
    pub fn new(
        name: impl Into<String>,
        slots: i32,
        rate_per_minute: Decimal,
        effective_from: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::Validation("Lot name is required".to_string()));
        }
        validate_rate(rate_per_minute)?;
        Ok(Self {
            name,
            slots: SlotCount::new(slots)?,
            rate_per_minute,
            effective_from,
        })
    }
}

/// Paid income of one lot for one day, dated by the sessions' exit date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyIncome {
    pub lot_id: i32,
    pub day: NaiveDate,
    pub total: Decimal,
    pub payments: u32,
}

impl DailyIncome {
    pub fn empty(lot_id: i32, day: NaiveDate) -> Self {
        Self {
            lot_id,
            day,
            total: Decimal::ZERO,
            payments: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn lot() -> ParkingLot {
        ParkingLot {
            id: 1,
            name: "Downtown".into(),
            total_slots: 3,
            rates: vec![
                RateChange {
                    rate_per_minute: dec!(1),
                    effective_from: t0(),
                },
                RateChange {
                    rate_per_minute: dec!(2),
                    effective_from: t0() + Duration::hours(10),
                },
            ],
            created_at: t0(),
        }
    }

    #[test]
    fn rate_at_picks_latest_effective_entry() {
        let lot = lot();
        assert_eq!(lot.rate_at(t0() + Duration::hours(1)), Some(dec!(1)));
        assert_eq!(lot.rate_at(t0() + Duration::hours(10)), Some(dec!(2)));
        assert_eq!(lot.rate_at(t0() + Duration::days(3)), Some(dec!(2)));
    }

    #[test]
    fn rate_before_history_uses_first_entry() {
        assert_eq!(lot().rate_at(t0() - Duration::days(1)), Some(dec!(1)));
    }

    #[test]
    fn rate_history_cannot_be_rewritten() {
        let lot = lot();
        let backdated = RateChange {
            rate_per_minute: dec!(5),
            effective_from: t0() + Duration::hours(1),
        };
        assert!(lot.validate_rate_change(&backdated).is_err());

        let future = RateChange {
            rate_per_minute: dec!(5),
            effective_from: t0() + Duration::hours(11),
        };
        assert!(lot.validate_rate_change(&future).is_ok());
    }

    #[test]
    fn slot_count_is_bounded() {
        assert!(SlotCount::new(0).is_err());
        assert!(SlotCount::new(-3).is_err());
        assert!(SlotCount::new(MAX_SLOTS_PER_LOT + 1).is_err());
        let count = SlotCount::new(3).unwrap();
        assert_eq!(count.numbers().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn new_lot_requires_name_and_non_negative_rate() {
        assert!(NewLot::new("  ", 3, dec!(1), t0()).is_err());
        assert!(NewLot::new("A", 3, dec!(-0.5), t0()).is_err());
        assert_eq!(NewLot::new(" A ", 3, dec!(1), t0()).unwrap().name, "A");
    }
}
