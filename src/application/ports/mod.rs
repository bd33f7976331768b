//! Application ports (hexagonal architecture boundaries)
//!
//! Repository ports are defined in `domain::repositories`. Ports to the
//! outside world that are not storage live here.

pub mod gateway;
pub mod webhook;

pub use gateway::{CashInRequest, CashInResponse, PaymentGateway};
pub use webhook::SignatureVerifier;
