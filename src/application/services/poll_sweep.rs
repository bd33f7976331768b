//! Background task that periodically polls outstanding payments.
//!
//! Recovers sessions whose webhook was lost or delayed. Each tick polls the
//! gateway for every PaymentPending session through the reconciler.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::reconciliation::ReconciliationService;
use crate::shared::shutdown::ShutdownSignal;

/// Start the poll sweep background task.
///
/// The first sweep runs one full `interval` after start.
pub fn start_poll_sweep_task(
    reconciler: Arc<ReconciliationService>,
    shutdown: ShutdownSignal,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "🔁 Payment poll sweep started");

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match reconciler.sweep_pending().await {
                        Ok(report) if report.polled > 0 => {
                            info!(
                                polled = report.polled,
                                settled = report.settled,
                                errors = report.errors,
                                "Payment poll sweep finished"
                            );
                        }
                        Ok(_) => debug!("Payment poll sweep: nothing pending"),
                        Err(e) => warn!(error = %e, "Payment poll sweep error"),
                    }
                }
                _ = shutdown.wait() => {
                    info!("🔁 Payment poll sweep shutting down");
                    break;
                }
            }
        }

        info!("🔁 Payment poll sweep stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{harness, manager};
    use crate::domain::{GatewayStatus, SessionStatus, VehicleCategory};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn sweep_task_settles_and_stops_on_shutdown() {
        let h = harness(1, dec!(1)).await;
        let ctx = manager(h.lot.id);
        let parked = h
            .parking
            .park(&ctx, "RAF123E", VehicleCategory::Sedan, None)
            .await
            .unwrap();
        h.parking.exit(&ctx, "RAF123E").await.unwrap();
        h.gateway.accept_with("R1");
        h.parking
            .initiate_payment(parked.id, "+250788123456")
            .await
            .unwrap();
        h.gateway.set_status("R1", GatewayStatus::Successful);

        let shutdown = ShutdownSignal::new();
        let task = start_poll_sweep_task(
            h.reconciler.clone(),
            shutdown.clone(),
            Duration::from_millis(10),
        );

        let mut status = SessionStatus::PaymentPending;
        for _ in 0..100 {
            status = h.parking.session(parked.id).await.unwrap().0.status;
            if status == SessionStatus::Paid {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, SessionStatus::Paid);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("sweep task did not stop")
            .unwrap();
    }
}
