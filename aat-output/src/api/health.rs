//! Liveness and build identification

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    /// Short commit hash the binary was built from
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    /// Output types the manager can dispatch to
    pub output_types: Vec<String>,
    /// Courses with a build running or queued
    pub active_builds: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        module: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        git_hash: env!("GIT_HASH"),
        build_timestamp: env!("BUILD_TIMESTAMP"),
        output_types: state.manager.output_types(),
        active_builds: state.manager.active_build_locks().await,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
