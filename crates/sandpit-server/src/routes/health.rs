//! `GET /health`: liveness plus a little runtime detail.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server answers.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// A `/qri` transform currently holds the dataset node.
    pub transform_running: bool,
    /// Per-script wall-clock limit in seconds (`0` = unlimited).
    pub script_timeout_secs: u64,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        transform_running: state.node.is_busy(),
        script_timeout_secs: state.interpreter.capabilities().timeout.as_secs(),
    })
}

/// Routes: `/health`.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
