//! Authenticated principal extraction for bearer-protected endpoints.
//!
//! The access token is validated purely by signature and expiry (no store
//! lookup); the credential record is only resolved afterwards so handlers get
//! a live email and status.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use tracing::error;

use crate::api::error::ApiError;

use super::state::AuthState;

/// Authenticated user context derived from the bearer access token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: uuid::Uuid,
    pub email: String,
}

/// Resolve the bearer access token into a principal, or a 401 for anything
/// missing, invalid, or expired.
pub async fn require_auth(
    headers: &HeaderMap,
    auth_state: &AuthState,
) -> Result<Principal, ApiError> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(ApiError::unauthorized("Missing bearer token"));
    };

    let user_id = auth_state
        .tokens()
        .validate_access(&token)
        .map_err(|_| ApiError::session_invalid())?;

    match auth_state.credentials().lookup_by_id(user_id).await {
        Ok(Some(user)) if user.is_active() => Ok(Principal {
            user_id: user.id,
            email: user.email,
        }),
        Ok(_) => Err(ApiError::session_invalid()),
        Err(err) => {
            error!("Failed to resolve principal: {err}");
            Err(ApiError::internal())
        }
    }
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
