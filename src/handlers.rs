//! Axum Handlers for the HTTP Surface
//!
//! The relay's HTTP surface outside the WebSocket endpoint is a single
//! liveness probe. It answers from process state alone and never consults
//! any active relay session.

use axum::{http::StatusCode, response::IntoResponse};

/// GET /health
///
/// Liveness probe for deployment orchestration and tunnel checks.
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
