//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the relay: the
//! WebSocket endpoint Vapi connects to as a custom transcriber, and the
//! liveness probe.

use crate::{handlers, state::AppState, ws::ws_handler};

use axum::{Router, routing::get};
use std::sync::Arc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/custom-transcriber", get(ws_handler))
        .route("/health", get(handlers::health_check))
        .with_state(app_state)
}
