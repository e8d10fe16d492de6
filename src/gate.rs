//! Edge route gate evaluated before any page handler.
//!
//! The gate checks only for the structural presence of the refresh cookie; it
//! is a cheap first filter, not the authorization boundary. API handlers
//! always perform full token validation regardless of what the gate decided.

use axum::{
    extract::Request,
    http::header::COOKIE,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::api::handlers::auth::REFRESH_COOKIE_NAME;

/// Where an already-signed-in session lands when it hits a public page.
pub const AUTHENTICATED_LANDING: &str = "/tickets";
/// Where an anonymous session is sent when it hits a protected page.
pub const LOGIN_PATH: &str = "/login";

/// Paths excluded from the gate entirely: the API validates tokens itself and
/// assets are public by definition.
const EXEMPT_PREFIXES: &[&str] = &[
    "/auth",
    "/users",
    "/health",
    "/docs",
    "/openapi.json",
    "/assets",
];

const PUBLIC_PATHS: &[&str] = &["/", "/login", "/forgot-password", "/reset-password"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Protected,
    Exempt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    PassThrough,
    /// Anonymous request for a protected page; the original target survives
    /// as a return-destination parameter.
    RedirectToLogin {
        return_to: String,
    },
    /// Signed-in session asking for a public page like the login form.
    RedirectToLanding,
}

#[must_use]
pub fn classify(path: &str) -> RouteClass {
    if EXEMPT_PREFIXES
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{prefix}/")))
    {
        return RouteClass::Exempt;
    }
    if PUBLIC_PATHS.contains(&path) {
        return RouteClass::Public;
    }
    RouteClass::Protected
}

/// Pure gate decision from the path and refresh-credential presence.
#[must_use]
pub fn evaluate(path: &str, has_refresh_credential: bool) -> GateDecision {
    match classify(path) {
        RouteClass::Exempt => GateDecision::PassThrough,
        RouteClass::Public => {
            if has_refresh_credential {
                GateDecision::RedirectToLanding
            } else {
                GateDecision::PassThrough
            }
        }
        RouteClass::Protected => {
            if has_refresh_credential {
                GateDecision::PassThrough
            } else {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("redirect", path)
                    .finish();
                GateDecision::RedirectToLogin {
                    return_to: format!("{LOGIN_PATH}?{query}"),
                }
            }
        }
    }
}

/// Axum middleware wrapper around [`evaluate`].
pub async fn gate(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let has_refresh_credential = has_refresh_cookie(&request);

    match evaluate(&path, has_refresh_credential) {
        GateDecision::PassThrough => next.run(request).await,
        GateDecision::RedirectToLogin { return_to } => Redirect::to(&return_to).into_response(),
        GateDecision::RedirectToLanding => Redirect::to(AUTHENTICATED_LANDING).into_response(),
    }
}

fn has_refresh_cookie(request: &Request) -> bool {
    let Some(header) = request.headers().get(COOKIE) else {
        return false;
    };
    let Ok(value) = header.to_str() else {
        return false;
    };
    value.split(';').any(|pair| {
        let mut parts = pair.trim().splitn(2, '=');
        parts.next().map(str::trim) == Some(REFRESH_COOKIE_NAME)
            && parts.next().is_some_and(|val| !val.trim().is_empty())
    })
}
