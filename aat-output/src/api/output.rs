//! Course output endpoints
//!
//! `GET /output/:type/preview/:courseid` and `GET /output/:type/publish/:courseid`
//! answer `{success: true, payload}` on success and
//! `{success: false, message}` with status 500 on any pipeline error.

use aat_common::Error;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crate::output::OutputRequest;
use crate::AppState;

/// Optional tenant selection; defaults to the master tenant
#[derive(Debug, Default, Deserialize)]
pub struct TenantQuery {
    pub tenant: Option<String>,
}

/// Pipeline failure rendered as a JSON 500
#[derive(Debug)]
pub struct OutputError(pub Error);

impl From<Error> for OutputError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for OutputError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "message": self.0.to_string(),
        }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

fn output_request(state: &AppState, course_id: String, query: TenantQuery) -> OutputRequest {
    let tenant_id = query
        .tenant
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| state.master_tenant_id.clone());
    OutputRequest::new(tenant_id, course_id)
}

fn success(payload: Value) -> Json<Value> {
    Json(json!({
        "success": true,
        "payload": payload,
    }))
}

/// GET /output/:type/preview/:courseid
pub async fn preview_course(
    State(state): State<AppState>,
    Path((output_type, course_id)): Path<(String, String)>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Value>, OutputError> {
    let request = output_request(&state, course_id, query);
    let payload = state
        .manager
        .preview(&output_type, &request)
        .await
        .map_err(|e| {
            error!("Preview of course {} failed: {}", request.course_id, e);
            e
        })?;
    Ok(success(payload))
}

/// GET /output/:type/publish/:courseid
pub async fn publish_course(
    State(state): State<AppState>,
    Path((output_type, course_id)): Path<(String, String)>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Value>, OutputError> {
    let request = output_request(&state, course_id, query);
    let payload = state
        .manager
        .publish(&output_type, &request)
        .await
        .map_err(|e| {
            error!("Publish of course {} failed: {}", request.course_id, e);
            e
        })?;
    Ok(success(payload))
}

/// Build output routes
pub fn output_routes() -> Router<AppState> {
    Router::new()
        .route("/output/:type/preview/:courseid", get(preview_course))
        .route("/output/:type/publish/:courseid", get(publish_course))
}
