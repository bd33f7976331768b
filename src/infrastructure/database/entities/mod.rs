//! Database entities module

pub mod lot;
pub mod lot_income;
pub mod lot_rate;
pub mod parking_session;
pub mod payment_attempt;
pub mod slot;

pub use lot::Entity as Lot;
pub use lot_income::Entity as LotIncome;
pub use lot_rate::Entity as LotRate;
pub use parking_session::Entity as ParkingSession;
pub use payment_attempt::Entity as PaymentAttempt;
pub use slot::Entity as Slot;
