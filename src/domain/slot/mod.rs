//! Slot aggregate
//!
//! Slots are created with their lot and only ever flip between Available
//! and Occupied.

pub mod model;
pub mod repository;

pub use model::{Occupant, Slot, SlotStatus};
pub use repository::SlotStore;
