//! Mobile-money gateway adapters

pub mod http_client;

pub use http_client::{HttpGatewayConfig, HttpPaymentGateway};
