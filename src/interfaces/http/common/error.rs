//! Mapping of domain and reconciliation errors onto HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use super::ApiResponse;
use crate::shared::errors::{DomainError, GatewayError, ReconcileError};

/// Error returned by handlers. Renders as the standard envelope with the
/// status picked from the error kind.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

fn gateway_status(e: &GatewayError) -> StatusCode {
    match e {
        GatewayError::Rejected(_) => StatusCode::PAYMENT_REQUIRED,
        GatewayError::Timeout | GatewayError::Transport(_) | GatewayError::Protocol(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        let status = match &e {
            DomainError::NotFound { .. }
            | DomainError::SlotNotFound { .. }
            | DomainError::NoActiveSession { .. } => StatusCode::NOT_FOUND,

            DomainError::Validation(_)
            | DomainError::InvalidPlate(_)
            | DomainError::InvalidCategory(_)
            | DomainError::InvalidPhone(_)
            | DomainError::InvalidInterval { .. } => StatusCode::BAD_REQUEST,

            DomainError::SlotOccupied { .. }
            | DomainError::SlotNotOccupied { .. }
            | DomainError::LotFull(_)
            | DomainError::PlateAlreadyParked { .. }
            | DomainError::InvalidTransition { .. }
            | DomainError::Conflict(_) => StatusCode::CONFLICT,

            DomainError::PaymentRejected(_) => StatusCode::PAYMENT_REQUIRED,
            DomainError::Gateway(g) => gateway_status(g),
            DomainError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %e, "Request failed");
        }
        Self::new(status, e.to_string())
    }
}

impl From<ReconcileError> for ApiError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::Domain(d) => d.into(),
            ReconcileError::InvalidSignature => Self::new(StatusCode::FORBIDDEN, e.to_string()),
            ReconcileError::MalformedPayload(_) => Self::bad_request(e.to_string()),
            ReconcileError::UnknownReference(_) => Self::new(StatusCode::NOT_FOUND, e.to_string()),
            ReconcileError::NoPaymentReference(_) => Self::new(StatusCode::CONFLICT, e.to_string()),
            ReconcileError::Gateway(ref g) => Self::new(gateway_status(g), e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.message))).into_response()
    }
}
