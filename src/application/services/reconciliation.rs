//! Payment reconciler
//!
//! Applies gateway outcomes that arrive by webhook push or by polling. The
//! two sources are unordered and may repeat; every outcome goes through the
//! same store-level guard (`PaymentPending` and current reference), so the
//! first terminal outcome wins and everything after it is a no-op.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::application::ports::{PaymentGateway, SignatureVerifier};
use crate::domain::{DomainError, GatewayStatus, RepositoryProvider, SessionStatus};
use crate::notifications::{Event, PaymentSettledEvent, SharedEventBus};
use crate::shared::clock::Clock;
use crate::shared::errors::ReconcileError;

/// What applying one gateway outcome did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The session moved to this state.
    Applied(SessionStatus),
    /// Duplicate, late or superseded outcome. The session is in this state
    /// and was not touched.
    Ignored(SessionStatus),
    /// The gateway still reports the transaction as pending.
    StillPending,
}

/// Summary of one poll sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub polled: usize,
    pub settled: usize,
    pub errors: usize,
}

/// `(reference, status)` extracted from a webhook body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookNotice {
    pub reference: String,
    pub status: String,
}

impl WebhookNotice {
    /// Accepts the flat `{"ref", "status"}` body and the
    /// `{"event_kind", "data": {"ref", "status"}}` envelope.
    pub fn parse(raw: &[u8]) -> Result<Self, ReconcileError> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| ReconcileError::MalformedPayload(e.to_string()))?;
        if !value.is_object() {
            return Err(ReconcileError::MalformedPayload(
                "body is not a JSON object".to_string(),
            ));
        }
        let body = value.get("data").filter(|d| d.is_object()).unwrap_or(&value);

        let field = |name: &str| {
            body.get(name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .ok_or_else(|| ReconcileError::MalformedPayload(format!("missing '{}'", name)))
        };

        Ok(Self {
            reference: field("ref")?,
            status: field("status")?,
        })
    }
}

pub struct ReconciliationService {
    repos: Arc<dyn RepositoryProvider>,
    gateway: Arc<dyn PaymentGateway>,
    verifier: Arc<dyn SignatureVerifier>,
    clock: Arc<dyn Clock>,
    events: SharedEventBus,
}

impl ReconciliationService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        gateway: Arc<dyn PaymentGateway>,
        verifier: Arc<dyn SignatureVerifier>,
        clock: Arc<dyn Clock>,
        events: SharedEventBus,
    ) -> Self {
        Self {
            repos,
            gateway,
            verifier,
            clock,
            events,
        }
    }

    /// Authenticate and apply a webhook delivery.
    ///
    /// Nothing is read or written before the signature checks out.
    pub async fn handle_webhook(
        &self,
        raw: &[u8],
        signature: Option<&str>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let authentic = signature
            .map(|sig| self.verifier.verify(raw, sig))
            .unwrap_or(false);
        if !authentic {
            metrics::counter!("parking_webhooks_rejected_total", "reason" => "signature")
                .increment(1);
            warn!(
                signature_present = signature.is_some(),
                body_len = raw.len(),
                "⚠️ Webhook signature mismatch, delivery rejected"
            );
            return Err(ReconcileError::InvalidSignature);
        }

        let notice = WebhookNotice::parse(raw).map_err(|e| {
            metrics::counter!("parking_webhooks_rejected_total", "reason" => "malformed")
                .increment(1);
            warn!(error = %e, "Malformed webhook payload");
            e
        })?;

        let outcome = GatewayStatus::parse(&notice.status);
        match self.apply(&notice.reference, outcome, "webhook").await {
            Err(ReconcileError::UnknownReference(reference)) => {
                metrics::counter!("parking_webhooks_rejected_total", "reason" => "unknown_reference")
                    .increment(1);
                warn!(reference = %reference, "Webhook for unknown payment reference ignored");
                Err(ReconcileError::UnknownReference(reference))
            }
            other => other,
        }
    }

    /// Ask the gateway for the status of the session's current reference and
    /// apply it. Gateway failures are returned and leave the session as is.
    pub async fn handle_poll(&self, session_id: i32) -> Result<ReconcileOutcome, ReconcileError> {
        let session = self
            .repos
            .sessions()
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "ParkingSession",
                field: "id",
                value: session_id.to_string(),
            })?;
        let reference = session
            .payment_ref
            .clone()
            .ok_or(ReconcileError::NoPaymentReference(session_id))?;

        if session.status != SessionStatus::PaymentPending {
            debug!(session_id, status = %session.status, "Poll skipped, nothing outstanding");
            return Ok(ReconcileOutcome::Ignored(session.status));
        }

        let outcome = self
            .gateway
            .transaction_status(&reference)
            .await
            .map_err(|e| {
                warn!(session_id, reference = %reference, error = %e, "Status poll failed");
                ReconcileError::Gateway(e)
            })?;

        self.apply(&reference, outcome, "poll").await
    }

    /// Poll every session waiting on the gateway.
    pub async fn sweep_pending(&self) -> Result<SweepReport, ReconcileError> {
        let pending = self.repos.sessions().find_pending_payments(None).await?;
        let mut report = SweepReport::default();

        for session in pending {
            report.polled += 1;
            match self.handle_poll(session.id).await {
                Ok(ReconcileOutcome::Applied(_)) => report.settled += 1,
                Ok(_) => {}
                Err(e) => {
                    report.errors += 1;
                    warn!(session_id = session.id, error = %e, "Sweep poll failed");
                }
            }
        }

        Ok(report)
    }

    async fn apply(
        &self,
        reference: &str,
        outcome: GatewayStatus,
        source: &'static str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let now = self.clock.now();
        let pending = outcome == GatewayStatus::Pending;
        let successful = outcome == GatewayStatus::Successful;

        let settlement = self
            .repos
            .sessions()
            .settle_payment(reference, outcome, now)
            .await
            .map_err(|e| match e {
                DomainError::NotFound { .. } => {
                    ReconcileError::UnknownReference(reference.to_string())
                }
                other => ReconcileError::Domain(other),
            })?;
        let session = settlement.session;

        if pending {
            debug!(session_id = session.id, reference, source, "Payment still pending");
            return Ok(ReconcileOutcome::StillPending);
        }

        if !settlement.applied {
            if successful && session.payment_ref.as_deref() != Some(reference) {
                warn!(
                    session_id = session.id,
                    reference,
                    current = ?session.payment_ref,
                    source,
                    "Late success for a superseded payment reference"
                );
            } else {
                debug!(
                    session_id = session.id,
                    reference,
                    status = %session.status,
                    source,
                    "Duplicate payment outcome ignored"
                );
            }
            return Ok(ReconcileOutcome::Ignored(session.status));
        }

        let label = match session.status {
            SessionStatus::Paid => "paid",
            _ => "failed",
        };
        metrics::counter!("parking_payments_settled_total", "outcome" => label).increment(1);
        info!(
            session_id = session.id,
            lot_id = session.lot_id,
            reference,
            status = %session.status,
            source,
            "✅ Payment settled"
        );
        self.events.publish(Event::PaymentSettled(PaymentSettledEvent {
            session_id: session.id,
            reference: reference.to_string(),
            status: session.status.to_string(),
            timestamp: now,
        }));

        Ok(ReconcileOutcome::Applied(session.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{harness, manager, Harness};
    use crate::domain::{AttemptStatus, ParkingSession, VehicleCategory};
    use crate::shared::errors::GatewayError;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn body(reference: &str, status: &str) -> Vec<u8> {
        serde_json::json!({ "ref": reference, "status": status })
            .to_string()
            .into_bytes()
    }

    /// Park, exit after 30 minutes and initiate payment accepted as `reference`.
    async fn pending_session(h: &Harness, reference: &str) -> ParkingSession {
        let ctx = manager(h.lot.id);
        let parked = h
            .parking
            .park(&ctx, "RAF123E", VehicleCategory::Sedan, None)
            .await
            .unwrap();
        h.clock.advance(Duration::minutes(30));
        h.parking.exit(&ctx, "RAF123E").await.unwrap();
        h.gateway.accept_with(reference);
        h.parking
            .initiate_payment(parked.id, "+250788123456")
            .await
            .unwrap()
    }

    async fn webhook(h: &Harness, reference: &str, status: &str) -> Result<ReconcileOutcome, ReconcileError> {
        let raw = body(reference, status);
        let signature = h.sign(&raw);
        h.reconciler.handle_webhook(&raw, Some(&signature)).await
    }

    #[tokio::test]
    async fn end_to_end_park_exit_pay() {
        let h = harness(3, dec!(1.6667)).await;
        let ctx = manager(h.lot.id);

        let parked = h
            .parking
            .park(&ctx, "RAF123E", VehicleCategory::Sedan, None)
            .await
            .unwrap();
        assert_eq!(parked.slot_id, 1);

        h.clock.advance(Duration::minutes(30));
        let closed = h.parking.exit(&ctx, "RAF123E").await.unwrap();
        assert_eq!(closed.fee, Some(dec!(50.001)));
        assert_eq!(closed.status, SessionStatus::AwaitingPayment);
        assert!(h.parking.slot_status(h.lot.id).await.unwrap()[0].is_available());

        let phone = h.phone.normalize("0788123456").unwrap();
        assert_eq!(phone, "+250788123456");
        h.gateway.accept_with("R1");
        let pending = h.parking.initiate_payment(parked.id, &phone).await.unwrap();
        assert_eq!(pending.status, SessionStatus::PaymentPending);
        assert_eq!(pending.payment_ref.as_deref(), Some("R1"));

        let first = webhook(&h, "R1", "successful").await.unwrap();
        assert_eq!(first, ReconcileOutcome::Applied(SessionStatus::Paid));
        let paid = h.parking.session(parked.id).await.unwrap().0;

        let second = webhook(&h, "R1", "successful").await.unwrap();
        assert_eq!(second, ReconcileOutcome::Ignored(SessionStatus::Paid));
        let after = h.parking.session(parked.id).await.unwrap().0;
        assert_eq!(paid, after);
    }

    #[tokio::test]
    async fn duplicate_webhook_has_one_side_effect() {
        let h = harness(1, dec!(1.6667)).await;
        let session = pending_session(&h, "R1").await;
        let mut events = h.events.subscribe();

        webhook(&h, "R1", "successful").await.unwrap();
        webhook(&h, "R1", "successful").await.unwrap();

        let day = session.exit_time.unwrap().date_naive();
        let income = h.parking.income(h.lot.id, day).await.unwrap();
        assert_eq!(income.total, dec!(50.001));
        assert_eq!(income.payments, 1);

        let settled = std::iter::from_fn(|| events.try_recv())
            .filter(|m| m.event.event_type() == "payment_settled")
            .count();
        assert_eq!(settled, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicate_webhooks_apply_once() {
        let h = harness(1, dec!(1)).await;
        let session = pending_session(&h, "R1").await;
        let raw = body("R1", "successful");
        let signature = h.sign(&raw);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let reconciler = h.reconciler.clone();
            let raw = raw.clone();
            let signature = signature.clone();
            handles.push(tokio::spawn(async move {
                reconciler.handle_webhook(&raw, Some(&signature)).await
            }));
        }
        let mut applied = 0;
        for handle in handles {
            if let ReconcileOutcome::Applied(_) = handle.await.unwrap().unwrap() {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
        let income = h
            .parking
            .income(h.lot.id, session.exit_time.unwrap().date_naive())
            .await
            .unwrap();
        assert_eq!(income.payments, 1);
    }

    async fn settle_in_order(poll_first: bool) -> ParkingSession {
        let h = harness(1, dec!(1.6667)).await;
        let session = pending_session(&h, "R1").await;
        h.gateway.set_status("R1", GatewayStatus::Successful);

        if poll_first {
            assert_eq!(
                h.reconciler.handle_poll(session.id).await.unwrap(),
                ReconcileOutcome::Applied(SessionStatus::Paid)
            );
            assert_eq!(
                webhook(&h, "R1", "successful").await.unwrap(),
                ReconcileOutcome::Ignored(SessionStatus::Paid)
            );
        } else {
            assert_eq!(
                webhook(&h, "R1", "successful").await.unwrap(),
                ReconcileOutcome::Applied(SessionStatus::Paid)
            );
            assert_eq!(
                h.reconciler.handle_poll(session.id).await.unwrap(),
                ReconcileOutcome::Ignored(SessionStatus::Paid)
            );
        }
        let income = h
            .parking
            .income(h.lot.id, session.exit_time.unwrap().date_naive())
            .await
            .unwrap();
        assert_eq!(income.payments, 1);
        h.parking.session(session.id).await.unwrap().0
    }

    #[tokio::test]
    async fn poll_and_webhook_commute() {
        let poll_then_webhook = settle_in_order(true).await;
        let webhook_then_poll = settle_in_order(false).await;
        assert_eq!(poll_then_webhook.status, SessionStatus::Paid);
        assert_eq!(poll_then_webhook, webhook_then_poll);
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_without_mutation() {
        let h = harness(1, dec!(1)).await;
        let session = pending_session(&h, "R1").await;
        let raw = body("R1", "successful");

        let err = h.reconciler.handle_webhook(&raw, Some("deadbeef")).await;
        assert!(matches!(err, Err(ReconcileError::InvalidSignature)));
        let err = h.reconciler.handle_webhook(&raw, None).await;
        assert!(matches!(err, Err(ReconcileError::InvalidSignature)));

        let tampered = body("R1", "failed");
        let err = h.reconciler.handle_webhook(&tampered, Some(&h.sign(&raw))).await;
        assert!(matches!(err, Err(ReconcileError::InvalidSignature)));

        let current = h.parking.session(session.id).await.unwrap().0;
        assert_eq!(current.status, SessionStatus::PaymentPending);
    }

    #[tokio::test]
    async fn malformed_payloads_are_rejected() {
        let h = harness(1, dec!(1)).await;
        for raw in [
            b"not json".to_vec(),
            b"[1,2]".to_vec(),
            br#"{"status":"successful"}"#.to_vec(),
            br#"{"ref":"R1"}"#.to_vec(),
            br#"{"ref":"","status":"successful"}"#.to_vec(),
        ] {
            let signature = h.sign(&raw);
            let err = h.reconciler.handle_webhook(&raw, Some(&signature)).await;
            assert!(
                matches!(err, Err(ReconcileError::MalformedPayload(_))),
                "payload {:?}",
                String::from_utf8_lossy(&raw)
            );
        }
    }

    #[tokio::test]
    async fn envelope_payload_is_accepted() {
        let h = harness(1, dec!(1)).await;
        pending_session(&h, "R1").await;
        let raw = serde_json::json!({
            "event_id": "evt-1",
            "event_kind": "transaction:processed",
            "data": { "ref": "R1", "kind": "CASHIN", "status": "successful" }
        })
        .to_string()
        .into_bytes();
        let signature = h.sign(&raw);
        let outcome = h.reconciler.handle_webhook(&raw, Some(&signature)).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied(SessionStatus::Paid));
    }

    #[tokio::test]
    async fn unknown_reference_is_reported() {
        let h = harness(1, dec!(1)).await;
        let err = webhook(&h, "NOPE", "successful").await;
        assert!(matches!(err, Err(ReconcileError::UnknownReference(ref r)) if r == "NOPE"));
    }

    #[tokio::test]
    async fn failed_payment_then_retry_and_late_success() {
        let h = harness(1, dec!(1)).await;
        let session = pending_session(&h, "R1").await;

        let failed = webhook(&h, "R1", "failed").await.unwrap();
        assert_eq!(failed, ReconcileOutcome::Applied(SessionStatus::PaymentFailed));

        h.gateway.accept_with("R2");
        let retried = h
            .parking
            .initiate_payment(session.id, "+250788123456")
            .await
            .unwrap();
        assert_eq!(retried.payment_ref.as_deref(), Some("R2"));
        assert_eq!(retried.payment_attempts, 2);

        // R1 reported successful after being superseded: R2 is still the
        // outstanding attempt.
        let late = webhook(&h, "R1", "successful").await.unwrap();
        assert_eq!(late, ReconcileOutcome::Ignored(SessionStatus::PaymentPending));

        let paid = webhook(&h, "R2", "successful").await.unwrap();
        assert_eq!(paid, ReconcileOutcome::Applied(SessionStatus::Paid));

        let (_, attempts) = h.parking.session(session.id).await.unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].status, AttemptStatus::Failed);
        assert_eq!(attempts[1].status, AttemptStatus::Successful);
        assert_eq!(attempts[1].idempotency_key, format!("parking-{}-2", session.id));
    }

    #[tokio::test]
    async fn pending_status_changes_nothing() {
        let h = harness(1, dec!(1)).await;
        let session = pending_session(&h, "R1").await;
        assert_eq!(
            webhook(&h, "R1", "pending").await.unwrap(),
            ReconcileOutcome::StillPending
        );
        h.gateway.set_status("R1", GatewayStatus::Pending);
        assert_eq!(
            h.reconciler.handle_poll(session.id).await.unwrap(),
            ReconcileOutcome::StillPending
        );
        let current = h.parking.session(session.id).await.unwrap().0;
        assert_eq!(current.status, SessionStatus::PaymentPending);
    }

    #[tokio::test]
    async fn poll_gateway_failure_keeps_session_pending() {
        let h = harness(1, dec!(1)).await;
        let session = pending_session(&h, "R1").await;
        h.gateway.fail_status_with(GatewayError::Timeout);

        let err = h.reconciler.handle_poll(session.id).await;
        assert!(matches!(err, Err(ReconcileError::Gateway(GatewayError::Timeout))));
        let current = h.parking.session(session.id).await.unwrap().0;
        assert_eq!(current.status, SessionStatus::PaymentPending);
    }

    #[tokio::test]
    async fn poll_without_reference_is_an_error() {
        let h = harness(1, dec!(1)).await;
        let ctx = manager(h.lot.id);
        let parked = h
            .parking
            .park(&ctx, "RAF123E", VehicleCategory::Sedan, None)
            .await
            .unwrap();
        let err = h.reconciler.handle_poll(parked.id).await;
        assert!(matches!(err, Err(ReconcileError::NoPaymentReference(id)) if id == parked.id));
    }

    #[tokio::test]
    async fn sweep_settles_resolved_sessions() {
        let h = harness(2, dec!(1)).await;
        let ctx = manager(h.lot.id);
        for (plate, reference) in [("RAA001A", "R1"), ("RAB002B", "R2")] {
            let parked = h
                .parking
                .park(&ctx, plate, VehicleCategory::Sedan, None)
                .await
                .unwrap();
            h.parking.exit(&ctx, plate).await.unwrap();
            h.gateway.accept_with(reference);
            h.parking
                .initiate_payment(parked.id, "+250788123456")
                .await
                .unwrap();
        }
        h.gateway.set_status("R1", GatewayStatus::Successful);
        h.gateway.set_status("R2", GatewayStatus::Pending);

        let report = h.reconciler.sweep_pending().await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                polled: 2,
                settled: 1,
                errors: 0
            }
        );
        let pending = h.parking.pending_payments(h.lot.id).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payment_ref.as_deref(), Some("R2"));
    }

    #[test]
    fn notice_parse_trims_fields() {
        let notice = WebhookNotice::parse(br#"{"ref":" R1 ","status":"successful"}"#).unwrap();
        assert_eq!(notice.reference, "R1");
        assert_eq!(notice.status, "successful");
    }

    #[test]
    fn reconciler_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Arc<ReconciliationService>>();
    }
}
