//! aat-output library - course build and publish pipeline
//!
//! Assembles a course from the content store, reshapes it for the
//! renderer, applies theme customisations, resolves assets and writes the
//! per-collection JSON tree a framework build consumes.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod output;
pub mod pipeline;

use output::OutputManager;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<OutputManager>,
    /// Tenant used when a request names none
    pub master_tenant_id: String,
}

impl AppState {
    pub fn new(manager: Arc<OutputManager>, master_tenant_id: impl Into<String>) -> Self {
        Self {
            manager,
            master_tenant_id: master_tenant_id.into(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::output_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
