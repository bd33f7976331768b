//! JSON body extractor that also runs `validator` rules
//!
//! A body that does not parse into `T` is a 400. A body that parses but
//! breaks a field rule is a 422 naming each offending field.

use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use super::ApiError;

pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, ApiError> {
        let Json(body) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        body.validate().map_err(field_errors)?;
        Ok(Self(body))
    }
}

fn field_errors(errors: ValidationErrors) -> ApiError {
    let mut lines = Vec::new();
    for (field, failures) in errors.field_errors() {
        for failure in failures {
            match &failure.message {
                Some(message) => lines.push(format!("{field}: {message}")),
                None => lines.push(format!("{field}: {}", failure.code)),
            }
        }
    }
    // field_errors() iterates a HashMap
    lines.sort();

    let message = if lines.is_empty() {
        "Validation failed".to_string()
    } else {
        lines.join("; ")
    };
    ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, message)
}
