//! Shared row conversion helpers

use std::str::FromStr;

use rust_decimal::Decimal;
use sea_orm::{DbErr, SqlErr};

use crate::domain::{DomainError, DomainResult};

pub(super) fn db_err(e: DbErr) -> DomainError {
    DomainError::Storage(e.to_string())
}

/// Decimals are stored as canonical text so SQLite never rounds them.
pub(super) fn decimal(column: &'static str, raw: &str) -> DomainResult<Decimal> {
    Decimal::from_str(raw)
        .map_err(|e| DomainError::Storage(format!("Corrupt decimal in {}: {:?} ({})", column, raw, e)))
}

pub(super) fn opt_decimal(column: &'static str, raw: Option<&str>) -> DomainResult<Option<Decimal>> {
    raw.map(|r| decimal(column, r)).transpose()
}

pub(super) fn corrupt(column: &'static str, raw: &str) -> DomainError {
    DomainError::Storage(format!("Unexpected value in {}: {:?}", column, raw))
}

/// The unique-constraint message of a failed insert, if that is what failed.
pub(super) fn unique_violation(e: &DbErr) -> Option<String> {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(msg)) => Some(msg),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decimal_text_keeps_scale() {
        assert_eq!(decimal("fee", "37.50").unwrap(), dec!(37.50));
        assert_eq!(decimal("fee", "37.50").unwrap().to_string(), "37.50");
        assert!(decimal("fee", "abc").is_err());
        assert_eq!(opt_decimal("fee", None).unwrap(), None);
    }
}
