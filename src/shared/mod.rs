pub mod clock;
pub mod errors;
pub mod phone;
pub mod retry;
pub mod shutdown;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{DomainError, GatewayError, InfraError, ReconcileError};
pub use phone::PhoneNormalizer;
pub use retry::{retry_with_backoff, RetryConfig};
pub use shutdown::{listen_for_shutdown_signals, ShutdownSignal};
