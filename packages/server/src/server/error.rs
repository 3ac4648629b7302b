//! Translation of [`AppError`] into the JSON error envelope.
//!
//! This is the only place an error becomes an HTTP status.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::common::AppError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        AppError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
        AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::Conflict { .. } => StatusCode::CONFLICT,
        AppError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Database(sqlx::Error::PoolTimedOut) => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = ?self, "Request failed");
        } else {
            tracing::debug!(code = self.code(), message = %self, "Request rejected");
        }

        let body = ErrorEnvelope {
            error: ErrorBody {
                code: self.code(),
                message: self.public_message(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Body parse failures become `INVALID_PAYLOAD` with the parser's message.
/// Amounts past the `NUMERIC(18,2)` range are reported as `INVALID_AMOUNT`.
pub fn invalid_payload(rejection: JsonRejection) -> AppError {
    let message = rejection.body_text();
    if matches!(rejection, JsonRejection::JsonDataError(_)) && message.contains("' is out of range") {
        return AppError::invalid_amount(message);
    }
    AppError::bad_request("INVALID_PAYLOAD", message)
}
