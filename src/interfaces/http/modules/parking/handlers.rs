//! Parking REST handlers: park, exit and per-lot queries

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;

use super::dto::{
    ExitRequest, IncomeDto, IncomeQuery, ParkRequest, SessionDto, SlotSummaryDto,
};
use crate::application::ManagerContext;
use crate::domain::VehicleCategory;
use crate::interfaces::http::common::{ApiError, ApiResponse, ValidatedJson};
use crate::interfaces::http::router::AppState;

/// Header identifying the acting manager.
pub const MANAGER_HEADER: &str = "x-manager-id";

fn manager_context(lot_id: i32, headers: &HeaderMap) -> Result<ManagerContext, ApiError> {
    let manager = headers
        .get(MANAGER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request("X-Manager-Id header is required"))?;
    Ok(ManagerContext::new(lot_id, manager))
}

#[utoipa::path(
    post,
    path = "/api/v1/lots/{lot_id}/park",
    tag = "Parking",
    params(
        ("lot_id" = i32, Path, description = "Lot ID"),
        ("X-Manager-Id" = String, Header, description = "Acting manager")
    ),
    request_body = ParkRequest,
    responses(
        (status = 201, description = "Vehicle parked", body = ApiResponse<SessionDto>),
        (status = 400, description = "Invalid plate or category"),
        (status = 404, description = "Unknown lot or slot"),
        (status = 409, description = "Slot occupied, lot full or plate already parked")
    )
)]
pub async fn park(
    State(state): State<AppState>,
    Path(lot_id): Path<i32>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<ParkRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SessionDto>>), ApiError> {
    let ctx = manager_context(lot_id, &headers)?;
    let category = VehicleCategory::parse(&body.category)?;
    let session = state
        .parking
        .park(&ctx, &body.plate, category, body.slot_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(session.into())),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/lots/{lot_id}/exit",
    tag = "Parking",
    params(
        ("lot_id" = i32, Path, description = "Lot ID"),
        ("X-Manager-Id" = String, Header, description = "Acting manager")
    ),
    request_body = ExitRequest,
    responses(
        (status = 200, description = "Session closed, fee computed", body = ApiResponse<SessionDto>),
        (status = 404, description = "No active session for the plate")
    )
)]
pub async fn exit(
    State(state): State<AppState>,
    Path(lot_id): Path<i32>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<ExitRequest>,
) -> Result<Json<ApiResponse<SessionDto>>, ApiError> {
    let ctx = manager_context(lot_id, &headers)?;
    let session = state.parking.exit(&ctx, &body.plate).await?;
    Ok(Json(ApiResponse::success(session.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/lots/{lot_id}/slots",
    tag = "Parking",
    params(("lot_id" = i32, Path, description = "Lot ID")),
    responses(
        (status = 200, description = "Slots of the lot", body = ApiResponse<SlotSummaryDto>),
        (status = 404, description = "Unknown lot")
    )
)]
pub async fn list_slots(
    State(state): State<AppState>,
    Path(lot_id): Path<i32>,
) -> Result<Json<ApiResponse<SlotSummaryDto>>, ApiError> {
    let slots = state.parking.slot_status(lot_id).await?;
    Ok(Json(ApiResponse::success(slots.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/lots/{lot_id}/pending-payments",
    tag = "Parking",
    params(("lot_id" = i32, Path, description = "Lot ID")),
    responses(
        (status = 200, description = "Sessions waiting on the gateway", body = ApiResponse<Vec<SessionDto>>)
    )
)]
pub async fn pending_payments(
    State(state): State<AppState>,
    Path(lot_id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<SessionDto>>>, ApiError> {
    let sessions = state.parking.pending_payments(lot_id).await?;
    Ok(Json(ApiResponse::success(
        sessions.into_iter().map(Into::into).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/lots/{lot_id}/income",
    tag = "Parking",
    params(("lot_id" = i32, Path, description = "Lot ID"), IncomeQuery),
    responses(
        (status = 200, description = "Paid income for the day", body = ApiResponse<IncomeDto>)
    )
)]
pub async fn daily_income(
    State(state): State<AppState>,
    Path(lot_id): Path<i32>,
    Query(query): Query<IncomeQuery>,
) -> Result<Json<ApiResponse<IncomeDto>>, ApiError> {
    let day = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let income = state.parking.income(lot_id, day).await?;
    Ok(Json(ApiResponse::success(income.into())))
}
