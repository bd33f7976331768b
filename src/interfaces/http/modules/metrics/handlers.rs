//! Prometheus scrape endpoint

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct MetricsState {
    pub handle: PrometheusHandle,
}

/// Register help text for the engine counters so they show up in the scrape
/// output with a description even before the first increment.
pub fn describe_metrics() {
    metrics::describe_counter!("parking_sessions_opened_total", "Vehicles parked");
    metrics::describe_counter!("parking_sessions_closed_total", "Vehicles exited with a fee");
    metrics::describe_counter!(
        "parking_payments_initiated_total",
        "Cash-in requests accepted by the gateway"
    );
    metrics::describe_counter!(
        "parking_payments_settled_total",
        "Terminal gateway outcomes applied to a session"
    );
    metrics::describe_counter!(
        "parking_webhooks_rejected_total",
        "Webhook deliveries rejected before reconciliation"
    );
    metrics::describe_counter!("http_requests_total", "HTTP requests served");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        metrics::Unit::Seconds,
        "HTTP request latency"
    );
}

/// `GET /metrics`
pub async fn prometheus_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.handle.render(),
    )
}
