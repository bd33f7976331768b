//! Gateway webhook receiver
//!
//! The body is taken as raw bytes: the signature covers the exact bytes the
//! gateway sent, so it must be checked before any JSON parsing.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use tracing::warn;

use crate::interfaces::http::common::{ApiError, ApiResponse};
use crate::interfaces::http::modules::payments::ReconcileDto;
use crate::interfaces::http::router::AppState;
use crate::shared::errors::ReconcileError;

#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payments",
    tag = "Webhooks",
    request_body(content = String, description = "Gateway event, `{ref, status}` or `{event_kind, data: {ref, status}}`"),
    responses(
        (status = 200, description = "Outcome applied, ignored or reference unknown", body = ApiResponse<ReconcileDto>),
        (status = 400, description = "Malformed payload"),
        (status = 403, description = "Signature missing or invalid")
    )
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<ReconcileDto>>), ApiError> {
    let signature = headers
        .get(&*state.signature_header)
        .and_then(|v| v.to_str().ok());

    match state.reconciler.handle_webhook(&body, signature).await {
        Ok(outcome) => Ok((StatusCode::OK, Json(ApiResponse::success(outcome.into())))),
        // Acknowledged so the gateway stops redelivering an event that will
        // never match a session here.
        Err(ReconcileError::UnknownReference(reference)) => {
            warn!("Webhook for unknown reference {} acknowledged", reference);
            Ok((
                StatusCode::OK,
                Json(ApiResponse::success(ReconcileDto::unknown_reference())),
            ))
        }
        Err(e) => Err(e.into()),
    }
}
