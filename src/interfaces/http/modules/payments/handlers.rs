//! Payment REST handlers

use axum::extract::{Path, State};
use axum::Json;

use super::dto::{InitiatePaymentRequest, ReconcileDto, SessionDetailDto};
use crate::interfaces::http::common::{ApiError, ApiResponse, ValidatedJson};
use crate::interfaces::http::modules::parking::SessionDto;
use crate::interfaces::http::router::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    tag = "Payments",
    params(("id" = i32, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session with its payment attempts", body = ApiResponse<SessionDetailDto>),
        (status = 404, description = "Session not found")
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<SessionDetailDto>>, ApiError> {
    let (session, attempts) = state.parking.session(id).await?;
    Ok(Json(ApiResponse::success(SessionDetailDto {
        session: session.into(),
        attempts: attempts.into_iter().map(Into::into).collect(),
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/payments",
    tag = "Payments",
    params(("id" = i32, Path, description = "Session ID")),
    request_body = InitiatePaymentRequest,
    responses(
        (status = 200, description = "Cash-in requested, session is PaymentPending", body = ApiResponse<SessionDto>),
        (status = 400, description = "Invalid phone number"),
        (status = 402, description = "Gateway rejected the request"),
        (status = 409, description = "Session is not payable"),
        (status = 502, description = "Gateway unavailable")
    )
)]
pub async fn initiate_payment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidatedJson(body): ValidatedJson<InitiatePaymentRequest>,
) -> Result<Json<ApiResponse<SessionDto>>, ApiError> {
    let phone = state.phone.normalize(&body.phone)?;
    let session = state.parking.initiate_payment(id, &phone).await?;
    Ok(Json(ApiResponse::success(session.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/poll",
    tag = "Payments",
    params(("id" = i32, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Gateway status applied", body = ApiResponse<ReconcileDto>),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session has no payment reference")
    )
)]
pub async fn poll_payment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<ReconcileDto>>, ApiError> {
    let outcome = state.reconciler.handle_poll(id).await?;
    Ok(Json(ApiResponse::success(outcome.into())))
}
