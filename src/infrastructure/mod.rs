//! Infrastructure layer - external concerns

pub mod crypto;
pub mod database;
pub mod gateway;
pub mod storage;

pub use crypto::HmacWebhookVerifier;
pub use database::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};
pub use gateway::{HttpGatewayConfig, HttpPaymentGateway};
pub use storage::InMemoryRepositoryProvider;
