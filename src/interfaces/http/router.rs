//! API Router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::common::ApiResponse;
use super::modules::{health, metrics, parking, payments, request_id, webhooks};
use crate::application::{ParkingService, ReconciliationService};
use crate::shared::phone::PhoneNormalizer;

/// State shared by every REST handler.
#[derive(Clone)]
pub struct AppState {
    pub parking: Arc<ParkingService>,
    pub reconciler: Arc<ReconciliationService>,
    pub phone: Arc<PhoneNormalizer>,
    /// Header carrying the gateway's webhook signature.
    pub signature_header: Arc<str>,
    /// `None` when running on the in-memory store.
    pub db: Option<DatabaseConnection>,
    pub started_at: Arc<Instant>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        parking::park,
        parking::exit,
        parking::list_slots,
        parking::pending_payments,
        parking::daily_income,
        payments::get_session,
        payments::initiate_payment,
        payments::poll_payment,
        webhooks::payment_webhook,
    ),
    components(
        schemas(
            ApiResponse<String>,
            health::HealthResponse,
            health::ComponentHealth,
            parking::ParkRequest,
            parking::ExitRequest,
            parking::SessionDto,
            parking::SlotDto,
            parking::SlotSummaryDto,
            parking::IncomeDto,
            payments::InitiatePaymentRequest,
            payments::AttemptDto,
            payments::SessionDetailDto,
            payments::ReconcileDto,
        )
    ),
    tags(
        (name = "Health", description = "Liveness and database reachability"),
        (name = "Parking", description = "Vehicle entry and exit, slot occupancy, daily income"),
        (name = "Payments", description = "Mobile-money collection for closed sessions"),
        (name = "Webhooks", description = "Signed payment outcomes pushed by the gateway"),
    ),
    info(
        title = "Parking Service API",
        version = "1.0.0",
        description = "Slot allocation and mobile-money payment reconciliation for parking lots",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

/// Build the REST router. `/metrics` is mounted only when a Prometheus
/// handle is supplied.
pub fn create_api_router(state: AppState, prometheus: Option<PrometheusHandle>) -> Router {
    let lot_routes = Router::new()
        .route("/{lot_id}/park", post(parking::park))
        .route("/{lot_id}/exit", post(parking::exit))
        .route("/{lot_id}/slots", get(parking::list_slots))
        .route("/{lot_id}/pending-payments", get(parking::pending_payments))
        .route("/{lot_id}/income", get(parking::daily_income));

    let session_routes = Router::new()
        .route("/{id}", get(payments::get_session))
        .route("/{id}/payments", post(payments::initiate_payment))
        .route("/{id}/poll", post(payments::poll_payment));

    let webhook_routes = Router::new().route("/payments", post(webhooks::payment_webhook));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health::health_check))
        .nest("/api/v1/lots", lot_routes)
        .nest("/api/v1/sessions", session_routes)
        .nest("/api/v1/webhooks", webhook_routes)
        .with_state(state);

    if let Some(handle) = prometheus {
        router = router.merge(
            Router::new()
                .route("/metrics", get(metrics::prometheus_metrics))
                .with_state(metrics::MetricsState { handle }),
        );
    }

    router
        .layer(middleware::from_fn(metrics::http_metrics_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id::request_id_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{harness, Harness};
    use crate::domain::GatewayStatus;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Duration;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(h: &Harness) -> Router {
        app_reading_signature_from(h, "x-paypack-signature")
    }

    fn app_reading_signature_from(h: &Harness, signature_header: &str) -> Router {
        let state = AppState {
            parking: h.parking.clone(),
            reconciler: h.reconciler.clone(),
            phone: Arc::new(h.phone.clone()),
            signature_header: Arc::from(signature_header),
            db: None,
            started_at: Arc::new(Instant::now()),
        };
        create_api_router(state, None)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .header("x-manager-id", "manager-1")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn webhook(h: &Harness, raw: &[u8], signed: bool) -> Request<Body> {
        let mut builder = Request::post("/api/v1/webhooks/payments")
            .header("content-type", "application/json");
        if signed {
            builder = builder.header("x-paypack-signature", h.sign(raw));
        }
        builder.body(Body::from(raw.to_vec())).unwrap()
    }

    /// Park, advance 30 minutes, exit. Returns the session id.
    async fn parked_and_exited(h: &Harness, app: &Router, plate: &str) -> i64 {
        let lot = h.lot.id;
        let (status, body) = send(
            app,
            post_json(
                &format!("/api/v1/lots/{}/park", lot),
                json!({"plate": plate, "category": "sedan"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);

        h.clock.advance(Duration::minutes(30));
        let (status, body) = send(
            app,
            post_json(&format!("/api/v1/lots/{}/exit", lot), json!({"plate": plate})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["data"]["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn park_then_exit_computes_fee_and_frees_slot() {
        let h = harness(2, dec!(1.6667)).await;
        let app = app(&h);
        let lot = h.lot.id;

        let (status, body) = send(
            &app,
            post_json(
                &format!("/api/v1/lots/{}/park", lot),
                json!({"plate": "raf 123e", "category": "SUV"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["plate"], "RAF123E");
        assert_eq!(body["data"]["slot_id"], 1);
        assert_eq!(body["data"]["status"], "Active");
        assert_eq!(body["data"]["recorded_by"], "manager-1");

        let (_, slots) = send(&app, get(&format!("/api/v1/lots/{}/slots", lot))).await;
        assert_eq!(slots["data"]["occupied"], 1);
        assert_eq!(slots["data"]["slots"][0]["plate"], "RAF123E");

        h.clock.advance(Duration::minutes(30));
        let (status, body) = send(
            &app,
            post_json(&format!("/api/v1/lots/{}/exit", lot), json!({"plate": "RAF123E"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["fee"], "50.001");
        assert_eq!(body["data"]["status"], "AwaitingPayment");

        let (_, slots) = send(&app, get(&format!("/api/v1/lots/{}/slots", lot))).await;
        assert_eq!(slots["data"]["available"], 2);
    }

    #[tokio::test]
    async fn park_errors_map_to_status_codes() {
        let h = harness(1, dec!(1)).await;
        let app = app(&h);
        let uri = format!("/api/v1/lots/{}/park", h.lot.id);

        let no_manager = Request::post(&uri)
            .header("content-type", "application/json")
            .body(Body::from(json!({"plate": "AB12", "category": "sedan"}).to_string()))
            .unwrap();
        assert_eq!(send(&app, no_manager).await.0, StatusCode::BAD_REQUEST);

        let (status, _) =
            send(&app, post_json(&uri, json!({"plate": "AB12", "category": "bus"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            send(&app, post_json(&uri, json!({"plate": "A!", "category": "sedan"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            post_json(&uri, json!({"plate": "AB12", "category": "sedan", "slot_id": 9})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            send(&app, post_json(&uri, json!({"plate": "AB12", "category": "sedan"}))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) =
            send(&app, post_json(&uri, json!({"plate": "CD34", "category": "sedan"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (status, _) = send(
            &app,
            post_json(
                &format!("/api/v1/lots/{}/exit", h.lot.id),
                json!({"plate": "ZZ99"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn payment_flow_over_http() {
        let h = harness(1, dec!(1.6667)).await;
        let app = app(&h);
        let id = parked_and_exited(&h, &app, "RAF123E").await;

        h.gateway.accept_with("REF-1");
        let (status, body) = send(
            &app,
            post_json(
                &format!("/api/v1/sessions/{}/payments", id),
                json!({"phone": "0788 123 456"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], "PaymentPending");
        assert_eq!(body["data"]["payment_ref"], "REF-1");
        assert_eq!(h.gateway.cash_in_requests()[0].phone, "+250788123456");

        let (_, pending) =
            send(&app, get(&format!("/api/v1/lots/{}/pending-payments", h.lot.id))).await;
        assert_eq!(pending["data"].as_array().unwrap().len(), 1);

        let raw = json!({"ref": "REF-1", "status": "successful"}).to_string();
        let (status, body) = send(&app, webhook(&h, raw.as_bytes(), true)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["outcome"], "applied");
        assert_eq!(body["data"]["status"], "Paid");

        // Redelivery is acknowledged but changes nothing.
        let (status, body) = send(&app, webhook(&h, raw.as_bytes(), true)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["outcome"], "ignored");

        let (_, detail) = send(&app, get(&format!("/api/v1/sessions/{}", id))).await;
        assert_eq!(detail["data"]["session"]["status"], "Paid");
        assert_eq!(detail["data"]["attempts"][0]["status"], "Successful");

        let (_, income) = send(
            &app,
            get(&format!("/api/v1/lots/{}/income?date=2024-06-01", h.lot.id)),
        )
        .await;
        assert_eq!(income["data"]["total"], "50.001");
        assert_eq!(income["data"]["payments"], 1);
    }

    #[tokio::test]
    async fn invalid_phone_is_rejected_before_the_gateway() {
        let h = harness(1, dec!(1)).await;
        let app = app(&h);
        let id = parked_and_exited(&h, &app, "AB12").await;

        let (status, _) = send(
            &app,
            post_json(
                &format!("/api/v1/sessions/{}/payments", id),
                json!({"phone": "0688123456"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(h.gateway.cash_in_requests().is_empty());
    }

    #[tokio::test]
    async fn poll_applies_gateway_status() {
        let h = harness(1, dec!(1)).await;
        let app = app(&h);
        let id = parked_and_exited(&h, &app, "AB12").await;

        let (status, _) = send(&app, post_json(&format!("/api/v1/sessions/{}/poll", id), json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        h.gateway.accept_with("REF-9");
        send(
            &app,
            post_json(
                &format!("/api/v1/sessions/{}/payments", id),
                json!({"phone": "0788123456"}),
            ),
        )
        .await;

        let (_, body) = send(&app, post_json(&format!("/api/v1/sessions/{}/poll", id), json!({}))).await;
        assert_eq!(body["data"]["outcome"], "pending");

        h.gateway
            .set_status("REF-9", GatewayStatus::Failed("failed".to_string()));
        let (_, body) = send(&app, post_json(&format!("/api/v1/sessions/{}/poll", id), json!({}))).await;
        assert_eq!(body["data"]["outcome"], "applied");
        assert_eq!(body["data"]["status"], "PaymentFailed");
    }

    #[tokio::test]
    async fn webhook_signature_and_payload_checks() {
        let h = harness(1, dec!(1)).await;
        let app = app(&h);

        let raw = json!({"ref": "NOPE", "status": "successful"}).to_string();
        let (status, _) = send(&app, webhook(&h, raw.as_bytes(), false)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, webhook(&h, raw.as_bytes(), true)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["outcome"], "unknown_reference");

        let (status, _) = send(&app, webhook(&h, b"{\"ref\":1}", true)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_signature_is_read_from_the_configured_header() {
        let h = harness(1, dec!(1)).await;
        let app = app_reading_signature_from(&h, "x-gateway-signature");
        let raw = json!({"ref": "NOPE", "status": "successful"}).to_string();

        let (status, _) = send(&app, webhook(&h, raw.as_bytes(), true)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let request = Request::post("/api/v1/webhooks/payments")
            .header("content-type", "application/json")
            .header("x-gateway-signature", h.sign(raw.as_bytes()))
            .body(Body::from(raw.clone()))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["outcome"], "unknown_reference");
    }

    #[tokio::test]
    async fn health_reports_memory_store_and_echoes_request_id() {
        let h = harness(1, dec!(1)).await;
        let app = app(&h);

        let request = Request::get("/health")
            .header("x-request-id", "req-42")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-request-id"], "req-42");

        let (_, body) = send(&app, get("/health")).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"]["status"], "memory");
    }

    #[tokio::test]
    async fn metrics_route_is_mounted_only_with_a_handle() {
        let h = harness(1, dec!(1)).await;
        assert_eq!(app(&h).oneshot(get("/metrics")).await.unwrap().status(), StatusCode::NOT_FOUND);

        let state = AppState {
            parking: h.parking.clone(),
            reconciler: h.reconciler.clone(),
            phone: Arc::new(h.phone.clone()),
            signature_header: Arc::from("x-paypack-signature"),
            db: None,
            started_at: Arc::new(Instant::now()),
        };
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let router = create_api_router(state, Some(handle));
        let response = router.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
