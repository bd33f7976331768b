//! Inbound payment gateway events

pub mod handlers;

pub use handlers::*;
