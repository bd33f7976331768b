//! Parking session aggregate
//!
//! A session records one vehicle's stay from park to final payment. It owns
//! its payment attempts.

pub mod model;
pub mod payment;
pub mod repository;

pub use model::{ExitRecord, NewSession, ParkingSession, SessionStatus};
pub use payment::{idempotency_key, AttemptStatus, GatewayStatus, PaymentAttempt, Settlement};
pub use repository::SessionRepository;
