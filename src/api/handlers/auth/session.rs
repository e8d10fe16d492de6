//! Refresh and logout endpoints plus the refresh-cookie helpers.
//!
//! The refresh token only ever travels in an `HttpOnly` cookie; page scripts
//! never see it. Internal token failures (invalid vs expired vs reused) are
//! collapsed into one generic 401 body so callers cannot probe the replay
//! detector.

use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{COOKIE, InvalidHeaderValue, SET_COOKIE},
    },
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::api::error::ApiError;

use super::{state::AuthState, types::RefreshResponse};

pub const REFRESH_COOKIE_NAME: &str = "bileto_refresh";

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Tokens rotated", body = RefreshResponse),
        (status = 401, description = "Invalid, expired, or reused refresh token", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let Some(presented) = extract_refresh_cookie(&headers) else {
        return ApiError::session_invalid().into_response();
    };

    match auth_state.tokens().refresh(&presented).await {
        Ok((_subject, pair)) => {
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
            let body = RefreshResponse {
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            };
            (StatusCode::OK, response_headers, Json(body)).into_response()
        }
        Err(err) if err.is_session_invalid() => {
            // Reuse detection already revoked the session inside the token
            // service; the caller only ever sees the generic body.
            debug!("Refresh rejected: {err}");
            ApiError::session_invalid().into_response()
        }
        Err(err) => {
            error!("Refresh failed: {err}");
            ApiError::internal().into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Some(presented) = extract_refresh_cookie(&headers) {
        match auth_state.tokens().refresh_subject(&presented) {
            Ok(subject) => {
                if let Err(err) = auth_state.tokens().revoke(subject).await {
                    error!("Failed to revoke refresh session: {err}");
                }
            }
            Err(err) => debug!("Logout with unusable refresh token: {err}"),
        }
    }

    // Always clear the cookie, even when no valid session was attached.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_refresh_cookie(&auth_state) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// Build the secure `HttpOnly` cookie carrying the refresh token.
pub(super) fn refresh_cookie(
    auth_state: &AuthState,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = auth_state.config().refresh_ttl_seconds();
    let secure = auth_state.config().refresh_cookie_secure();
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_refresh_cookie(
    auth_state: &AuthState,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = auth_state.config().refresh_cookie_secure();
    let mut cookie = format!("{REFRESH_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn extract_refresh_cookie(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == REFRESH_COOKIE_NAME && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}
