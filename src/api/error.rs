//! Wire-level error responses.
//!
//! Every failure body has the same `{statusCode, message}` shape, and
//! credential/enumeration-sensitive operations always use the same generic
//! message regardless of which internal check failed.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const SESSION_INVALID: &str = "Session invalid";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Identical body for "unknown identifier" and "wrong password".
    #[must_use]
    pub fn invalid_credentials() -> Self {
        Self::unauthorized(INVALID_CREDENTIALS)
    }

    /// Collapsed form of every token-layer failure.
    #[must_use]
    pub fn session_invalid() -> Self {
        Self::unauthorized(SESSION_INVALID)
    }

    /// Internal failures never leak details to the caller.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status_code: self.status.as_u16(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
