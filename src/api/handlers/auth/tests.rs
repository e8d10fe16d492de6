//! Auth handler tests against the in-memory stores.

use std::sync::Arc;

use axum::body::to_bytes;
use axum::extract::Extension;
use axum::http::{
    HeaderMap, HeaderValue, StatusCode,
    header::{AUTHORIZATION, COOKIE, SET_COOKIE},
};
use axum::response::{IntoResponse, Response};
use axum::Json;
use anyhow::{Context, Result};
use secrecy::SecretString;
use uuid::Uuid;

use crate::api::handlers::me::{change_password, get_me};
use crate::store::UserRecord;
use crate::store::memory::{
    MemoryCredentialStore, MemoryRefreshSessionStore, MemoryResetTokenStore,
};
use crate::token::{TokenService, unix_now};

use super::login::login;
use super::password::{forgot_password, reset_password};
use super::session::{REFRESH_COOKIE_NAME, logout, refresh};
use super::state::{AuthConfig, AuthState};
use super::types::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, ResetPasswordRequest,
};
use super::utils::{generate_reset_token, hash_password, hash_reset_token};

const EMAIL: &str = "admin@example.com";
const PASSWORD: &str = "AdminPassword123!";

async fn seeded_state() -> Result<(Arc<AuthState>, Uuid)> {
    let credentials = Arc::new(MemoryCredentialStore::new());
    let user_id = Uuid::new_v4();
    credentials
        .insert(UserRecord {
            id: user_id,
            email: EMAIL.to_string(),
            password_hash: hash_password(PASSWORD)?,
            status: "active".to_string(),
        })
        .await;

    let tokens = TokenService::new(
        SecretString::from("handler-test-signing-key"),
        900,
        7 * 24 * 60 * 60,
        Arc::new(MemoryRefreshSessionStore::new()),
    );
    let state = AuthState::new(
        AuthConfig::new("https://bileto.dev".to_string()),
        tokens,
        credentials,
        Arc::new(MemoryResetTokenStore::new()),
    );
    Ok((Arc::new(state), user_id))
}

fn login_payload(identifier: &str, password: &str) -> Option<Json<LoginRequest>> {
    Some(Json(LoginRequest {
        identifier: identifier.to_string(),
        password: password.to_string(),
    }))
}

async fn body_json(response: Response) -> Result<serde_json::Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .context("failed to read body")?;
    serde_json::from_slice(&bytes).context("body is not json")
}

fn refresh_cookie_value(response: &Response) -> Result<String> {
    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .context("missing set-cookie")?
        .to_str()?;
    let (pair, _) = cookie.split_once(';').context("malformed cookie")?;
    let (name, value) = pair.split_once('=').context("malformed cookie pair")?;
    anyhow::ensure!(name == REFRESH_COOKIE_NAME, "unexpected cookie name");
    Ok(value.to_string())
}

fn cookie_headers(token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        COOKIE,
        HeaderValue::from_str(&format!("{REFRESH_COOKIE_NAME}={token}"))?,
    );
    Ok(headers)
}

fn bearer_headers(token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}"))?,
    );
    Ok(headers)
}

#[tokio::test]
async fn login_returns_tokens_cookie_and_user() -> Result<()> {
    let (state, user_id) = seeded_state().await?;

    let response = login(Extension(state.clone()), login_payload(EMAIL, PASSWORD))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CREATED);

    let cookie = refresh_cookie_value(&response)?;
    assert!(!cookie.is_empty());

    let body = body_json(response).await?;
    let access = body["accessToken"].as_str().context("accessToken")?;
    assert!(!access.is_empty());
    assert!(!body["refreshToken"].as_str().context("refreshToken")?.is_empty());
    assert_eq!(body["user"]["email"], EMAIL);

    // The access token resolves back to the same subject.
    assert_eq!(state.tokens().validate_access(access)?, user_id);
    Ok(())
}

#[tokio::test]
async fn login_failures_share_one_response_shape() -> Result<()> {
    let (state, _) = seeded_state().await?;

    let wrong_password = login(Extension(state.clone()), login_payload(EMAIL, "WrongPassword1!"))
        .await
        .into_response();
    let unknown_user = login(
        Extension(state),
        login_payload("nobody@example.com", PASSWORD),
    )
    .await
    .into_response();

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);

    let wrong_body = body_json(wrong_password).await?;
    let unknown_body = body_json(unknown_user).await?;
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["statusCode"], 401);
    assert!(wrong_body["message"].is_string());
    Ok(())
}

#[tokio::test]
async fn login_missing_payload_is_400() -> Result<()> {
    let (state, _) = seeded_state().await?;
    let response = login(Extension(state), None).await.into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_and_replay_revokes_everything() -> Result<()> {
    let (state, _) = seeded_state().await?;

    let response = login(Extension(state.clone()), login_payload(EMAIL, PASSWORD))
        .await
        .into_response();
    let first_refresh = refresh_cookie_value(&response)?;

    // First refresh succeeds and rotates the cookie.
    let response = refresh(cookie_headers(&first_refresh)?, Extension(state.clone()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    let second_refresh = refresh_cookie_value(&response)?;
    assert_ne!(first_refresh, second_refresh);

    // Replaying the superseded token fails with the generic body...
    let response = refresh(cookie_headers(&first_refresh)?, Extension(state.clone()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await?;
    assert_eq!(body["statusCode"], 401);

    // ...and takes the previously-valid rotated token down with it.
    let response = refresh(cookie_headers(&second_refresh)?, Extension(state))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn refresh_without_cookie_is_401() -> Result<()> {
    let (state, _) = seeded_state().await?;
    let response = refresh(HeaderMap::new(), Extension(state))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn me_requires_a_valid_bearer_token() -> Result<()> {
    let (state, _) = seeded_state().await?;

    let response = get_me(HeaderMap::new(), Extension(state.clone()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get_me(bearer_headers("not-a-token")?, Extension(state.clone()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = login(Extension(state.clone()), login_payload(EMAIL, PASSWORD))
        .await
        .into_response();
    let access = body_json(response).await?["accessToken"]
        .as_str()
        .context("accessToken")?
        .to_string();
    let response = get_me(bearer_headers(&access)?, Extension(state))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["email"], EMAIL);
    Ok(())
}

#[tokio::test]
async fn logout_revokes_the_session_and_clears_the_cookie() -> Result<()> {
    let (state, _) = seeded_state().await?;

    let response = login(Extension(state.clone()), login_payload(EMAIL, PASSWORD))
        .await
        .into_response();
    let refresh_token = refresh_cookie_value(&response)?;

    let response = logout(cookie_headers(&refresh_token)?, Extension(state.clone()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = response
        .headers()
        .get(SET_COOKIE)
        .context("missing set-cookie")?
        .to_str()?;
    assert!(cleared.contains("Max-Age=0"));

    // The revoked refresh token is gone for good.
    let response = refresh(cookie_headers(&refresh_token)?, Extension(state))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn forgot_password_is_enumeration_resistant() -> Result<()> {
    let (state, _) = seeded_state().await?;

    let known = forgot_password(
        Extension(state.clone()),
        Some(Json(ForgotPasswordRequest {
            identifier: EMAIL.to_string(),
        })),
    )
    .await
    .into_response();
    let unknown = forgot_password(
        Extension(state),
        Some(Json(ForgotPasswordRequest {
            identifier: "ghost@example.com".to_string(),
        })),
    )
    .await
    .into_response();

    assert_eq!(known.status(), StatusCode::ACCEPTED);
    assert_eq!(unknown.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(known).await?, body_json(unknown).await?);
    Ok(())
}

#[tokio::test]
async fn reset_password_is_single_use_and_revokes_sessions() -> Result<()> {
    let (state, user_id) = seeded_state().await?;

    let response = login(Extension(state.clone()), login_payload(EMAIL, PASSWORD))
        .await
        .into_response();
    let refresh_token = refresh_cookie_value(&response)?;

    // Registry entry seeded the way forgot-password would.
    let token = generate_reset_token()?;
    state
        .reset_tokens()
        .put(user_id, &hash_reset_token(&token), unix_now() + 3600)
        .await?;

    let response = reset_password(
        Extension(state.clone()),
        Some(Json(ResetPasswordRequest {
            token: token.clone(),
            new_password: "BrandNewPassword1!".to_string(),
        })),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    // Single use: the same token is rejected on replay.
    let response = reset_password(
        Extension(state.clone()),
        Some(Json(ResetPasswordRequest {
            token,
            new_password: "AnotherPassword1!".to_string(),
        })),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Recovery revoked the outstanding refresh session.
    let response = refresh(cookie_headers(&refresh_token)?, Extension(state.clone()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Old password is dead, new one works.
    let response = login(Extension(state.clone()), login_payload(EMAIL, PASSWORD))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = login(
        Extension(state),
        login_payload(EMAIL, "BrandNewPassword1!"),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn reset_password_distinguishes_unknown_and_expired() -> Result<()> {
    let (state, user_id) = seeded_state().await?;

    let response = reset_password(
        Extension(state.clone()),
        Some(Json(ResetPasswordRequest {
            token: "no-such-token".to_string(),
            new_password: "BrandNewPassword1!".to_string(),
        })),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let token = generate_reset_token()?;
    state
        .reset_tokens()
        .put(user_id, &hash_reset_token(&token), unix_now() - 1)
        .await?;
    let response = reset_password(
        Extension(state),
        Some(Json(ResetPasswordRequest {
            token,
            new_password: "BrandNewPassword1!".to_string(),
        })),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn change_password_reverifies_the_current_password() -> Result<()> {
    let (state, _) = seeded_state().await?;

    let response = login(Extension(state.clone()), login_payload(EMAIL, PASSWORD))
        .await
        .into_response();
    let access = body_json(response).await?["accessToken"]
        .as_str()
        .context("accessToken")?
        .to_string();

    let response = change_password(
        bearer_headers(&access)?,
        Extension(state.clone()),
        Some(Json(ChangePasswordRequest {
            current_password: "NotTheRightOne1!".to_string(),
            new_password: "ReplacementPass1!".to_string(),
        })),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = change_password(
        bearer_headers(&access)?,
        Extension(state.clone()),
        Some(Json(ChangePasswordRequest {
            current_password: PASSWORD.to_string(),
            new_password: "ReplacementPass1!".to_string(),
        })),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let response = login(
        Extension(state),
        login_payload(EMAIL, "ReplacementPass1!"),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(())
}
