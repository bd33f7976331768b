pub mod context;
pub mod ports;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types for convenience
pub use context::ManagerContext;
pub use ports::{CashInRequest, CashInResponse, PaymentGateway, SignatureVerifier};
pub use services::{
    start_poll_sweep_task, LotService, ParkingService, ReconcileOutcome, ReconciliationService,
    SweepReport,
};
