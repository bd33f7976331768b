//! Test doubles and fixtures shared by service and HTTP tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::application::context::ManagerContext;
use crate::application::ports::{CashInRequest, CashInResponse, PaymentGateway};
use crate::application::services::{LotService, ParkingService, ReconciliationService};
use crate::domain::{GatewayStatus, ParkingLot};
use crate::infrastructure::crypto::HmacWebhookVerifier;
use crate::infrastructure::storage::InMemoryRepositoryProvider;
use crate::notifications::{create_event_bus, SharedEventBus};
use crate::shared::clock::ManualClock;
use crate::shared::errors::GatewayError;
use crate::shared::phone::PhoneNormalizer;
use crate::shared::retry::RetryConfig;

pub const WEBHOOK_SECRET: &str = "whsec_test";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

pub fn manager(lot_id: i32) -> ManagerContext {
    ManagerContext::new(lot_id, "manager-1")
}

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        backoff_multiplier: 2.0,
        max_delay: Duration::from_millis(5),
    }
}

/// Gateway that answers from a script. With nothing scripted, cash-in is
/// accepted under a generated reference and every status is pending.
#[derive(Default)]
pub struct ScriptedGateway {
    cash_in_script: Mutex<VecDeque<Result<CashInResponse, GatewayError>>>,
    requests: Mutex<Vec<CashInRequest>>,
    statuses: Mutex<HashMap<String, GatewayStatus>>,
    status_error: Mutex<Option<GatewayError>>,
    generated: AtomicU32,
}

impl ScriptedGateway {
    pub fn push_cash_in(&self, response: Result<CashInResponse, GatewayError>) {
        self.cash_in_script.lock().unwrap().push_back(response);
    }

    pub fn accept_with(&self, reference: &str) {
        self.push_cash_in(Ok(CashInResponse {
            reference: reference.to_string(),
            status: GatewayStatus::Pending,
        }));
    }

    pub fn set_status(&self, reference: &str, status: GatewayStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(reference.to_string(), status);
    }

    pub fn fail_status_with(&self, error: GatewayError) {
        *self.status_error.lock().unwrap() = Some(error);
    }

    pub fn cash_in_requests(&self) -> Vec<CashInRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn cash_in(&self, request: &CashInRequest) -> Result<CashInResponse, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        let scripted = self.cash_in_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            let n = self.generated.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(CashInResponse {
                reference: format!("AUTO-{}", n),
                status: GatewayStatus::Pending,
            })
        })
    }

    async fn transaction_status(&self, reference: &str) -> Result<GatewayStatus, GatewayError> {
        if let Some(error) = self.status_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .unwrap_or(GatewayStatus::Pending))
    }
}

/// Services wired over the in-memory store, a scripted gateway and a manual
/// clock starting at [`t0`], with one lot already created.
pub struct Harness {
    pub repos: Arc<InMemoryRepositoryProvider>,
    pub gateway: Arc<ScriptedGateway>,
    pub clock: Arc<ManualClock>,
    pub events: SharedEventBus,
    pub verifier: Arc<HmacWebhookVerifier>,
    pub phone: PhoneNormalizer,
    pub lots: Arc<LotService>,
    pub parking: Arc<ParkingService>,
    pub reconciler: Arc<ReconciliationService>,
    pub lot: ParkingLot,
}

impl Harness {
    pub fn sign(&self, raw: &[u8]) -> String {
        self.verifier.sign(raw)
    }
}

pub async fn harness(slots: i32, rate_per_minute: Decimal) -> Harness {
    let repos = Arc::new(InMemoryRepositoryProvider::new());
    let gateway = Arc::new(ScriptedGateway::default());
    let clock = Arc::new(ManualClock::new(t0()));
    let events = create_event_bus();
    let verifier = Arc::new(HmacWebhookVerifier::new(WEBHOOK_SECRET).unwrap());

    let lots = Arc::new(LotService::new(repos.clone()));
    let lot = lots
        .create_lot("Test Lot", slots, rate_per_minute, t0())
        .await
        .unwrap();

    let parking = Arc::new(
        ParkingService::new(repos.clone(), gateway.clone(), clock.clone(), events.clone())
            .with_retry(fast_retry()),
    );
    let reconciler = Arc::new(ReconciliationService::new(
        repos.clone(),
        gateway.clone(),
        verifier.clone(),
        clock.clone(),
        events.clone(),
    ));

    Harness {
        repos,
        gateway,
        clock,
        events,
        verifier,
        phone: PhoneNormalizer::default(),
        lots,
        parking,
        reconciler,
        lot,
    }
}
