use crate::{
    api::handlers::{auth, root},
    gate,
    store::postgres::{PgCredentialStore, PgRefreshSessionStore, PgResetTokenStore},
    token::TokenService,
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use secrecy::SecretString;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub(crate) mod error;
pub mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use error::{ApiError, ErrorBody};
pub use openapi::openapi;

pub use crate::GIT_COMMIT_HASH;

/// Assemble the full application router around an already-built auth state.
///
/// The edge gate runs before every route; API paths are exempt inside the
/// gate itself. Used directly by router-level tests with in-memory stores.
///
/// # Errors
///
/// Returns an error if the frontend base URL cannot be turned into a CORS
/// origin.
pub fn app(auth_state: Arc<auth::AuthState>, pool: Option<PgPool>) -> Result<Router> {
    let frontend_origin = frontend_origin(auth_state.config().frontend_base_url())?;
    // The refresh cookie only flows cross-origin when allow-credentials is
    // paired with an exact allow-origin.
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let (router, openapi) = openapi::api_router().split_for_parts();
    let mut app = router
        .merge(SwaggerUi::new("/docs").url("/openapi.json", openapi))
        .route("/", get(root::root))
        .layer(axum::middleware::from_fn(gate::gate))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth_state)),
        );
    if let Some(pool) = pool {
        app = app.layer(Extension(pool));
    }
    Ok(app)
}

/// Start the server against Postgres-backed stores.
///
/// # Errors
///
/// Returns an error if the database connection or the listener fails.
pub async fn new(
    port: u16,
    dsn: String,
    signing_key: SecretString,
    auth_config: auth::AuthConfig,
) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .acquire_timeout(Duration::from_secs(5))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    // Explicit composition root: every collaborator is constructed here and
    // injected, never resolved from process-wide state.
    let tokens = TokenService::new(
        signing_key,
        auth_config.access_ttl_seconds(),
        auth_config.refresh_ttl_seconds(),
        Arc::new(PgRefreshSessionStore::new(pool.clone())),
    );
    let auth_state = Arc::new(auth::AuthState::new(
        auth_config,
        tokens,
        Arc::new(PgCredentialStore::new(pool.clone())),
        Arc::new(PgResetTokenStore::new(pool.clone())),
    ));

    let app = app(auth_state, Some(pool))?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::frontend_origin;

    #[test]
    fn frontend_origin_strips_path_and_keeps_port() -> anyhow::Result<()> {
        let origin = frontend_origin("https://app.bileto.dev:8443/some/path")?;
        assert_eq!(origin.to_str()?, "https://app.bileto.dev:8443");
        Ok(())
    }

    #[test]
    fn frontend_origin_rejects_garbage() {
        assert!(frontend_origin("not a url").is_err());
    }
}
