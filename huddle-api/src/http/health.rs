//! Health check and metrics endpoints

use axum::{
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    routing::get,
    Router,
};

use super::{AppResult, AppState};

/// Health and metrics router
pub fn create_health_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
}

/// Basic health check (always returns OK if server is running)
pub async fn health_check() -> impl IntoResponse {
    "OK"
}

/// Prometheus scrape endpoint
pub async fn metrics() -> AppResult<impl IntoResponse> {
    let body = huddle_core::metrics::gather_text()?;
    Ok(([(CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
