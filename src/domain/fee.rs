//! Parking fee calculation
//!
//! `fee = ceil(minutes parked) * rate_per_minute`. Partial minutes are
//! always billed as a full minute.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::lot::ParkingLot;
use crate::shared::errors::DomainError;

/// Which entry of a lot's rate history prices a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatePolicy {
    /// Rate in force when the vehicle parked. A rate change never re-prices
    /// a vehicle that is already inside.
    Entry,
    /// Rate in force when the vehicle left.
    Exit,
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self::Entry
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingPolicy {
    pub rate_policy: RatePolicy,
    /// Floor on billed minutes. 0 bills a zero-length stay as nothing.
    pub minimum_minutes: u32,
}

impl BillingPolicy {
    /// Resolve the per-minute rate for a stay in `lot`.
    pub fn rate_for(
        &self,
        lot: &ParkingLot,
        entry_time: DateTime<Utc>,
        exit_time: DateTime<Utc>,
    ) -> Result<Decimal, DomainError> {
        let at = match self.rate_policy {
            RatePolicy::Entry => entry_time,
            RatePolicy::Exit => exit_time,
        };
        lot.rate_at(at)
            .ok_or_else(|| DomainError::Validation(format!("Lot {} has no rate", lot.id)))
    }

    pub fn fee(
        &self,
        entry_time: DateTime<Utc>,
        exit_time: DateTime<Utc>,
        rate_per_minute: Decimal,
    ) -> Result<Decimal, DomainError> {
        let minutes = billable_minutes(entry_time, exit_time)?.max(self.minimum_minutes as i64);
        amount(minutes, rate_per_minute)
    }
}

/// Whole minutes between entry and exit, rounded up.
pub fn billable_minutes(
    entry_time: DateTime<Utc>,
    exit_time: DateTime<Utc>,
) -> Result<i64, DomainError> {
    if exit_time < entry_time {
        return Err(DomainError::InvalidInterval {
            entry: entry_time.to_rfc3339(),
            exit: exit_time.to_rfc3339(),
        });
    }

    let parked = exit_time - entry_time;
    let whole = parked.num_minutes();
    Ok(if parked > Duration::minutes(whole) {
        whole + 1
    } else {
        whole
    })
}

/// Fee with no minimum-minute floor.
pub fn fee(
    entry_time: DateTime<Utc>,
    exit_time: DateTime<Utc>,
    rate_per_minute: Decimal,
) -> Result<Decimal, DomainError> {
    amount(billable_minutes(entry_time, exit_time)?, rate_per_minute)
}

fn amount(minutes: i64, rate_per_minute: Decimal) -> Result<Decimal, DomainError> {
    if rate_per_minute.is_sign_negative() {
        return Err(DomainError::Validation(format!(
            "Negative rate {}",
            rate_per_minute
        )));
    }
    Decimal::from(minutes)
        .checked_mul(rate_per_minute)
        .ok_or_else(|| DomainError::Validation("Fee overflow".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn thirty_minutes_at_legacy_rate() {
        let fee = fee(t0(), t0() + Duration::minutes(30), dec!(1.6667)).unwrap();
        assert_eq!(fee, dec!(50.001));
    }

    #[test]
    fn partial_minute_is_billed_as_full_minute() {
        let rate = dec!(2);
        assert_eq!(fee(t0(), t0() + Duration::seconds(1), rate).unwrap(), dec!(2));
        assert_eq!(fee(t0(), t0() + Duration::seconds(61), rate).unwrap(), dec!(4));
        assert_eq!(
            fee(t0(), t0() + Duration::minutes(5) + Duration::milliseconds(1), rate).unwrap(),
            dec!(12)
        );
    }

    #[test]
    fn exact_minutes_are_not_rounded_up() {
        assert_eq!(fee(t0(), t0() + Duration::minutes(5), dec!(2)).unwrap(), dec!(10));
    }

    #[test]
    fn zero_duration_is_free_without_minimum() {
        assert_eq!(fee(t0(), t0(), dec!(1.6667)).unwrap(), dec!(0));
    }

    #[test]
    fn zero_duration_bills_one_minute_with_minimum() {
        let policy = BillingPolicy {
            minimum_minutes: 1,
            ..BillingPolicy::default()
        };
        assert_eq!(policy.fee(t0(), t0(), dec!(1.6667)).unwrap(), dec!(1.6667));
        // floor does not affect longer stays
        assert_eq!(
            policy.fee(t0(), t0() + Duration::minutes(3), dec!(1)).unwrap(),
            dec!(3)
        );
    }

    #[test]
    fn exit_before_entry_is_invalid_interval() {
        let err = fee(t0(), t0() - Duration::seconds(1), dec!(1)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidInterval { .. }));
    }

    #[test]
    fn negative_rate_is_rejected() {
        assert!(fee(t0(), t0() + Duration::minutes(1), dec!(-1)).is_err());
    }

    #[test]
    fn fee_is_monotonic_in_exit_time() {
        let rate = dec!(1.6667);
        let mut previous = Decimal::ZERO;
        for secs in (0..=3 * 3600).step_by(17) {
            let current = fee(t0(), t0() + Duration::seconds(secs), rate).unwrap();
            assert!(current >= previous, "fee dropped at {}s", secs);
            previous = current;
        }
    }
}
