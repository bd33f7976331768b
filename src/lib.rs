//! # Parking service
//!
//! Slot allocation, fee calculation and mobile-money payment reconciliation
//! for one or more parking lots.
//!
//! ## Architecture
//!
//! - **domain**: lots, slots, sessions and payment attempts, the fee
//!   calculator and the repository traits
//! - **application**: the parking engine, the payment reconciler and the
//!   poll sweep
//! - **infrastructure**: SeaORM and in-memory stores, the gateway HTTP
//!   client, webhook signature verification
//! - **interfaces**: REST API with Swagger documentation
//! - **notifications**: in-process event bus
//! - **shared**: errors, retry, clock, phone numbers, shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod notifications;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};

pub use infrastructure::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};

pub use interfaces::http::create_api_router;

pub use notifications::{create_event_bus, Event, EventBus, SharedEventBus};
