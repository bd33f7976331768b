pub mod fee;
pub mod lot;
pub mod repositories;
pub mod session;
pub mod slot;
pub mod vehicle;

// Re-export commonly used types
pub use fee::{BillingPolicy, RatePolicy};
pub use lot::{DailyIncome, LotRepository, NewLot, ParkingLot, RateChange, SlotCount};
pub use repositories::{DomainResult, RepositoryProvider};
pub use session::{
    AttemptStatus, ExitRecord, GatewayStatus, NewSession, ParkingSession, PaymentAttempt,
    SessionRepository, SessionStatus, Settlement,
};
pub use slot::{Occupant, Slot, SlotStatus, SlotStore};
pub use vehicle::{Plate, VehicleCategory};

pub use crate::shared::errors::DomainError;
