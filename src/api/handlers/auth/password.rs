//! Password recovery endpoints.
//!
//! Forgot-password is intentionally opaque: callers always get the same 202
//! body whether or not the identifier resolves, so accounts cannot be
//! enumerated. The reset token itself is single-use and short-lived; the
//! registry enforces at most one live token per user.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use std::sync::Arc;
use tracing::{debug, error};

use crate::api::error::ApiError;
use crate::store::ResetConsumeOutcome;
use crate::token::unix_now;

use super::{
    state::AuthState,
    types::{ForgotPasswordRequest, ForgotPasswordResponse, ResetPasswordRequest},
    utils::{
        generate_reset_token, hash_password, hash_reset_token, normalize_email, valid_email,
        valid_new_password,
    },
};

const GENERIC_FORGOT_MESSAGE: &str = "If the account exists, a reset link has been sent";

#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 202, description = "Accepted; same body whether or not the account exists", body = ForgotPasswordResponse),
        (status = 400, description = "Missing payload", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> impl IntoResponse {
    let request: ForgotPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return ApiError::bad_request("Missing payload").into_response(),
    };

    let email = normalize_email(&request.identifier);
    if valid_email(&email) {
        if let Err(err) = create_reset_token(&auth_state, &email).await {
            // Failures stay server-side; the response shape never changes.
            error!("Failed to create reset token: {err}");
        }
    }

    (
        StatusCode::ACCEPTED,
        Json(ForgotPasswordResponse {
            message: GENERIC_FORGOT_MESSAGE.to_string(),
        }),
    )
        .into_response()
}

async fn create_reset_token(auth_state: &AuthState, email: &str) -> anyhow::Result<()> {
    let Some(user) = auth_state.credentials().lookup_by_email(email).await? else {
        return Ok(());
    };
    if !user.is_active() {
        return Ok(());
    }

    let token = generate_reset_token()?;
    let token_hash = hash_reset_token(&token);
    let expires_at = unix_now() + auth_state.config().reset_token_ttl_seconds();
    auth_state
        .reset_tokens()
        .put(user.id, &token_hash, expires_at)
        .await?;

    // Stand-in for out-of-band delivery; raw tokens never reach info-level
    // logs.
    debug!(user_id = %user.id, "password reset token issued");
    Ok(())
}

#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "Expired or already-used token", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown token", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let request: ResetPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return ApiError::bad_request("Missing payload").into_response(),
    };

    let token = request.token.trim();
    if token.is_empty() {
        return ApiError::bad_request("Missing token").into_response();
    }
    if !valid_new_password(&request.new_password) {
        return ApiError::bad_request("Password too short").into_response();
    }

    let token_hash = hash_reset_token(token);
    let outcome = match auth_state
        .reset_tokens()
        .consume(&token_hash, unix_now())
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("Failed to consume reset token: {err}");
            return ApiError::internal().into_response();
        }
    };

    let user_id = match outcome {
        ResetConsumeOutcome::Consumed { user_id } => user_id,
        ResetConsumeOutcome::NotFound => {
            return ApiError::not_found("Invalid reset token").into_response();
        }
        ResetConsumeOutcome::Expired => {
            return ApiError::bad_request("Reset token expired").into_response();
        }
        ResetConsumeOutcome::AlreadyUsed => {
            return ApiError::bad_request("Reset token already used").into_response();
        }
    };

    let password_hash = match hash_password(&request.new_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash new password: {err}");
            return ApiError::internal().into_response();
        }
    };
    match auth_state
        .credentials()
        .update_password_hash(user_id, &password_hash)
        .await
    {
        Ok(true) => {}
        Ok(false) => return ApiError::not_found("Invalid reset token").into_response(),
        Err(err) => {
            error!("Failed to update password: {err}");
            return ApiError::internal().into_response();
        }
    }

    // Recovery implies the old sessions are suspect; drop them all.
    if let Err(err) = auth_state.tokens().revoke(user_id).await {
        error!("Failed to revoke sessions after reset: {err}");
    }

    StatusCode::OK.into_response()
}
