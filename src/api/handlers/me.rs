//! Authenticated self-service endpoints.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

use super::auth::{
    AuthState,
    principal::require_auth,
    types::{ChangePasswordRequest, UserSummary},
    utils::{hash_password, valid_new_password, verify_password},
};
use crate::api::error::ApiError;

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "The authenticated user", body = UserSummary),
        (status = 401, description = "Missing or invalid bearer token", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn get_me(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    let body = UserSummary {
        id: principal.user_id.to_string(),
        email: principal.email,
    };
    (StatusCode::OK, Json(body)).into_response()
}

#[utoipa::path(
    post,
    path = "/users/me/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "Malformed payload", body = crate::api::error::ErrorBody),
        (status = 401, description = "Wrong current password", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn change_password(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    let request: ChangePasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return ApiError::bad_request("Missing payload").into_response(),
    };
    if !valid_new_password(&request.new_password) {
        return ApiError::bad_request("Password too short").into_response();
    }

    // Re-verify the current password before accepting the new one; a stolen
    // access token alone must not be enough to take over the credential.
    let user = match auth_state.credentials().lookup_by_id(principal.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return ApiError::session_invalid().into_response(),
        Err(err) => {
            error!("Failed to lookup credential: {err}");
            return ApiError::internal().into_response();
        }
    };
    if !verify_password(&user.password_hash, &request.current_password) {
        return ApiError::invalid_credentials().into_response();
    }

    let password_hash = match hash_password(&request.new_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash new password: {err}");
            return ApiError::internal().into_response();
        }
    };
    match auth_state
        .credentials()
        .update_password_hash(user.id, &password_hash)
        .await
    {
        // Other sessions deliberately stay alive after a self-service change.
        Ok(true) => StatusCode::OK.into_response(),
        Ok(false) => ApiError::session_invalid().into_response(),
        Err(err) => {
            error!("Failed to update password: {err}");
            ApiError::internal().into_response()
        }
    }
}
