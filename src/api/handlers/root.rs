use axum::response::IntoResponse;

/// Undocumented landing route; useful as a cheap liveness probe.
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}
