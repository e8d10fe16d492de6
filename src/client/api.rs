//! HTTP client for the auth API.
//!
//! The refresh token lives in the `HttpOnly` cookie jar managed by reqwest;
//! only the short-lived access token is held in memory and attached as a
//! bearer credential. Requests carry a short timeout, and only transport
//! failures are retried (once) — 4xx responses are never retried.

use reqwest::StatusCode;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::APP_USER_AGENT;
use crate::api::error::ErrorBody;
use crate::api::handlers::auth::types::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LoginResponse, RefreshResponse,
    ResetPasswordRequest, UserSummary,
};

use super::controller::{Navigation, SessionController};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base url")]
    BaseUrl,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message} ({status_code})")]
    Api { status_code: u16, message: String },
}

impl ClientError {
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

/// Session-aware client for the auth endpoints.
pub struct AuthClient {
    http: reqwest::Client,
    base_url: Url,
    access_token: RwLock<Option<String>>,
}

impl AuthClient {
    /// Build a client against the API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is unusable or the client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|_| ClientError::BaseUrl)?;
        let http = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .cookie_store(true)
            .build()?;
        Ok(Self {
            http,
            base_url,
            access_token: RwLock::new(None),
        })
    }

    /// Log in and remember the returned access token.
    ///
    /// # Errors
    ///
    /// `Api` with status 401 for bad credentials, `Transport` otherwise.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<UserSummary, ClientError> {
        let response = self
            .http
            .post(self.endpoint("/auth/login")?)
            .json(&LoginRequest {
                identifier: identifier.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let body: LoginResponse = parse_json(response).await?;
        self.set_access_token(Some(body.access_token));
        Ok(body.user)
    }

    /// Exchange the refresh cookie for a new token pair.
    ///
    /// # Errors
    ///
    /// `Api` with status 401 once the session is invalid; the caller should
    /// treat that as logged-out and not retry.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let response = self.http.post(self.endpoint("/auth/refresh")?).send().await?;
        let body: RefreshResponse = parse_json(response).await?;
        self.set_access_token(Some(body.access_token));
        Ok(())
    }

    /// Fetch the current user with the bearer access token.
    ///
    /// # Errors
    ///
    /// `Api` with status 401 when no valid session backs the token.
    pub async fn me(&self) -> Result<UserSummary, ClientError> {
        let mut request = self.http.get(self.endpoint("/auth/me")?);
        if let Some(token) = self.access_token() {
            request = request.bearer_auth(token);
        }
        let response = match request.try_clone() {
            // One immediate retry on transport failure only; status errors
            // pass straight through.
            Some(retry) => match request.send().await {
                Ok(response) => response,
                Err(err) if err.is_connect() => retry.send().await.map_err(|_| err)?,
                Err(err) => return Err(err.into()),
            },
            None => request.send().await?,
        };
        parse_json(response).await
    }

    /// Clear local token material and revoke the server-side session.
    ///
    /// # Errors
    ///
    /// `Transport` if the revoke call cannot be delivered; local state is
    /// cleared regardless.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.set_access_token(None);
        let response = self.http.post(self.endpoint("/auth/logout")?).send().await?;
        expect_status(response, StatusCode::NO_CONTENT).await
    }

    /// Request a password-reset token; the response is identical whether or
    /// not the identifier exists.
    ///
    /// # Errors
    ///
    /// `Transport` on delivery failure.
    pub async fn forgot_password(&self, identifier: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.endpoint("/auth/forgot-password")?)
            .json(&ForgotPasswordRequest {
                identifier: identifier.to_string(),
            })
            .send()
            .await?;
        expect_status(response, StatusCode::ACCEPTED).await
    }

    /// Redeem a reset token for a new password.
    ///
    /// # Errors
    ///
    /// `Api` with 400/404 for expired, used, or unknown tokens.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.endpoint("/auth/reset-password")?)
            .json(&ResetPasswordRequest {
                token: token.to_string(),
                new_password: new_password.to_string(),
            })
            .send()
            .await?;
        expect_status(response, StatusCode::OK).await
    }

    /// Change the password of the authenticated user.
    ///
    /// # Errors
    ///
    /// `Api` with 401 when the current password does not verify.
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ClientError> {
        let mut request = self.http.post(self.endpoint("/users/me/change-password")?);
        if let Some(token) = self.access_token() {
            request = request.bearer_auth(token);
        }
        let response = request
            .json(&ChangePasswordRequest {
                current_password: current_password.to_string(),
                new_password: new_password.to_string(),
            })
            .send()
            .await?;
        expect_status(response, StatusCode::OK).await
    }

    /// Mount-time hydration: confirm the session and drive the controller.
    ///
    /// Dropping the returned future cancels the in-flight request, so an
    /// unmounted controller is never resolved late. Every failure — auth or
    /// network — settles the phase as unauthenticated.
    pub async fn hydrate(&self, controller: &mut SessionController) -> Option<Navigation> {
        controller.resolve(self.me().await.ok())
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url.join(path).map_err(|_| ClientError::BaseUrl)
    }

    fn access_token(&self) -> Option<String> {
        self.access_token
            .read()
            .ok()
            .and_then(|token| token.clone())
    }

    fn set_access_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.access_token.write() {
            *slot = token;
        }
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    if response.status().is_success() {
        return Ok(response.json().await?);
    }
    Err(api_error(response).await)
}

async fn expect_status(
    response: reqwest::Response,
    expected: StatusCode,
) -> Result<(), ClientError> {
    if response.status() == expected || response.status().is_success() {
        return Ok(());
    }
    Err(api_error(response).await)
}

/// Decode the `{statusCode, message}` body, falling back to the HTTP status.
async fn api_error(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    match response.json::<ErrorBody>().await {
        Ok(body) => ClientError::Api {
            status_code: body.status_code,
            message: body.message,
        },
        Err(_) => ClientError::Api {
            status_code: status,
            message: "Request failed".to_string(),
        },
    }
}
