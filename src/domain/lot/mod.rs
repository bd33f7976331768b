//! Parking lot aggregate
//!
//! A lot owns its slots and an append-only rate history.

pub mod model;
pub mod repository;

pub use model::{DailyIncome, NewLot, ParkingLot, RateChange, SlotCount, MAX_SLOTS_PER_LOT};
pub use repository::LotRepository;
