//! Password login endpoint.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

use crate::api::error::ApiError;

use super::{
    session::refresh_cookie,
    state::AuthState,
    types::{LoginRequest, LoginResponse, UserSummary},
    utils::{equalize_verify_work, normalize_email, valid_email, verify_password},
};

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 201, description = "Authenticated; refresh cookie set", body = LoginResponse),
        (status = 400, description = "Malformed payload", body = crate::api::error::ErrorBody),
        (status = 401, description = "Unknown identifier or wrong password", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return ApiError::bad_request("Missing payload").into_response(),
    };

    let email = normalize_email(&request.identifier);
    if !valid_email(&email) || request.password.is_empty() {
        return ApiError::bad_request("Invalid identifier or password").into_response();
    }

    let record = match auth_state.credentials().lookup_by_email(&email).await {
        Ok(record) => record,
        Err(err) => {
            error!("Failed to lookup credential: {err}");
            return ApiError::internal().into_response();
        }
    };

    // Unknown identifier, inactive user, and wrong password all share one
    // response; the dummy verification keeps the unknown path from returning
    // measurably faster.
    let user = match record {
        Some(user) if user.is_active() => user,
        _ => {
            equalize_verify_work(&request.password);
            return ApiError::invalid_credentials().into_response();
        }
    };
    if !verify_password(&user.password_hash, &request.password) {
        return ApiError::invalid_credentials().into_response();
    }

    let pair = match auth_state.tokens().issue(user.id).await {
        Ok(pair) => pair,
        Err(err) => {
            error!("Failed to issue tokens: {err}");
            return ApiError::internal().into_response();
        }
    };

    let mut response_headers = HeaderMap::new();
    match refresh_cookie(&auth_state, &pair.refresh_token) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build refresh cookie: {err}");
            return ApiError::internal().into_response();
        }
    }

    let body = LoginResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        user: UserSummary {
            id: user.id.to_string(),
            email: user.email,
        },
    };
    (StatusCode::CREATED, response_headers, Json(body)).into_response()
}
