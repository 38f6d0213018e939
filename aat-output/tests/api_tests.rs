//! Integration tests for aat-output HTTP endpoints
//!
//! Tests cover:
//! - Health endpoint
//! - Preview and publish success envelopes
//! - Tenant selection via `?tenant=`
//! - Error envelopes with status 500

mod helpers;

use aat_output::{build_router, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use helpers::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

fn setup_app(fixture: &Fixture) -> axum::Router {
    let state = AppState::new(Arc::new(fixture.manager()), MASTER);
    build_router(state)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = Fixture::new(CountingStorage::default());
    let response = setup_app(&fixture).oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "aat-output");
    assert_eq!(json["output_types"], json!(["adapt"]));
    assert_eq!(json["active_builds"], json!(0));
    assert!(json["git_hash"].as_str().is_some_and(|hash| !hash.is_empty()));
}

#[tokio::test]
async fn test_preview_success_envelope() {
    let fixture = Fixture::new(CountingStorage::default());
    let response = setup_app(&fixture)
        .oneshot(get("/output/adapt/preview/c1?tenant=t1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["success"], json!(true));
    assert_eq!(json["payload"]["theme"], json!("adapt-contrib-vanilla"));
    assert!(fixture.paths.course_output(TENANT, COURSE).join("config.json").is_file());
}

#[tokio::test]
async fn test_publish_success_envelope() {
    let fixture = Fixture::new(CountingStorage::default());
    let response = setup_app(&fixture)
        .oneshot(get("/output/adapt/publish/c1?tenant=t1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["success"], json!(true));
    assert_eq!(json["payload"]["slug"], json!("safety-basics"));
}

#[tokio::test]
async fn test_default_tenant_is_master() {
    let fixture = Fixture::new(CountingStorage::default());
    // The course lives in tenant t1, so the master tenant has no such course
    let response = setup_app(&fixture)
        .oneshot(get("/output/adapt/preview/c1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["success"], json!(false));
    assert!(json["message"].as_str().unwrap().starts_with("Retrieval error"));
}

#[tokio::test]
async fn test_unknown_output_type_returns_500() {
    let fixture = Fixture::new(CountingStorage::default());
    let response = setup_app(&fixture)
        .oneshot(get("/output/scorm/publish/c1?tenant=t1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["success"], json!(false));
    assert_eq!(json["message"], json!("output type plugin scorm was not found"));
}
