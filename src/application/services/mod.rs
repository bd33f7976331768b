//! Application services

mod lots;
mod parking;
mod poll_sweep;
mod reconciliation;
mod session_locks;

pub use lots::LotService;
pub use parking::ParkingService;
pub use poll_sweep::start_poll_sweep_task;
pub use reconciliation::{ReconcileOutcome, ReconciliationService, SweepReport, WebhookNotice};
pub use session_locks::{SessionGuard, SessionLocks};
