//! Integration tests for hotspot-engine API endpoints

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use helpers::{
    create_test_state, group_signals, seed_signals, wait_for_terminal, GatedEmbedder, GroupEmbedder, FOUR_GROUPS,
};
use http_body_util::BodyExt;
use hotspot_engine::models::ClusteringParameters;
use hotspot_engine::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::util::ServiceExt;
use uuid::Uuid;

fn markers() -> Vec<&'static str> {
    FOUR_GROUPS.iter().map(|g| g.marker).collect()
}

/// Test helper: create test app over a temporary database
async fn create_test_app() -> (Router, AppState, TempDir) {
    let embedder = Arc::new(GroupEmbedder::new(&markers()));
    let (dir, state) = create_test_state(embedder, ClusteringParameters::default()).await.unwrap();
    (hotspot_engine::build_router(state.clone()), state, dir)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _state, _dir) = create_test_app().await;

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "hotspot-engine");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn test_ingest_signal_classifies_inline() {
    let (app, _state, _dir) = create_test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/signals",
        Some(json!({
            "scope": "acme",
            "title": "Approval workflow delay on purchase orders",
            "description": "Every request waits a week for sign-off",
            "severity": "high",
            "department": "Operations"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["root_cause"], "process");
    assert_eq!(body["features_ready"], true);

    let signal_id = body["signal_id"].as_str().unwrap();
    let (status, body) = send(&app, "GET", &format!("/signals/{}", signal_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scope"], "acme");
    assert_eq!(body["title"], "Approval workflow delay on purchase orders");
    assert!(body["features"]["embedding"].as_array().map(|v| !v.is_empty()).unwrap_or(false));
}

#[tokio::test]
async fn test_ingest_rejects_blank_title() {
    let (app, _state, _dir) = create_test_app().await;

    let (status, body) = send(&app, "POST", "/signals", Some(json!({"title": "   "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unknown_resources_return_404() {
    let (app, _state, _dir) = create_test_app().await;
    let id = Uuid::new_v4();

    for uri in [
        format!("/signals/{}", id),
        format!("/hotspots/{}", id),
        format!("/clustering/status/{}", id),
        format!("/clustering/results/{}", id),
    ] {
        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    let (status, _) = send(&app, "POST", &format!("/clustering/cancel/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_results_conflict_until_completed() {
    let release = CancellationToken::new();
    let embedder = Arc::new(GatedEmbedder::new(GroupEmbedder::new(&markers()), release.clone()));
    let (_dir, state) = create_test_state(embedder, ClusteringParameters::default()).await.unwrap();
    let app = hotspot_engine::build_router(state.clone());
    seed_signals(state.signals.as_ref(), &group_signals("acme", &FOUR_GROUPS[0], 6)).await;

    let (status, body) = send(&app, "POST", "/clustering/start", Some(json!({"scope_filter": {"scope": "acme"}}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["already_running"], false);
    let job_id: Uuid = body["job_id"].as_str().unwrap().parse().unwrap();

    let (status, body) = send(&app, "GET", &format!("/clustering/results/{}", job_id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, body) = send(&app, "GET", &format!("/clustering/status/{}", job_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scope"], "acme");
    assert!(body["status"] == "QUEUED" || body["status"] == "PROCESSING");

    release.cancel();
    wait_for_terminal(&state, job_id).await;

    let (status, body) = send(&app, "GET", &format!("/clustering/results/{}", job_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["input_signal_count"], 6);
    assert!(body["final_clusters"].is_array());
}

#[tokio::test]
async fn test_start_rejects_invalid_parameters() {
    let (app, _state, _dir) = create_test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/clustering/start",
        Some(json!({"parameters": {"similarity_threshold": 2.0}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("similarity_threshold"));
}

#[tokio::test]
async fn test_hotspot_review_flow() {
    let (app, state, _dir) = create_test_app().await;
    seed_signals(state.signals.as_ref(), &group_signals("acme", &FOUR_GROUPS[2], 6)).await;

    let (_, body) = send(&app, "POST", "/clustering/start", Some(json!({"scope_filter": {"scope": "acme"}}))).await;
    let job_id: Uuid = body["job_id"].as_str().unwrap().parse().unwrap();
    wait_for_terminal(&state, job_id).await;

    let (status, body) = send(&app, "GET", "/hotspots?scope=acme&status=open", None).await;
    assert_eq!(status, StatusCode::OK);
    let hotspots = body.as_array().unwrap();
    assert!(!hotspots.is_empty());
    let hotspot_id = hotspots[0]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", &format!("/hotspots/{}", hotspot_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["signals"].as_array().unwrap().is_empty());

    let (status, body) = send(
        &app,
        "POST",
        &format!("/hotspots/{}/status", hotspot_id),
        Some(json!({"status": "approved"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");

    // Approved hotspots can only be archived
    let (status, _) = send(
        &app,
        "POST",
        &format!("/hotspots/{}/status", hotspot_id),
        Some(json!({"status": "open"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/hotspots?status=bogus", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_regenerate_features_endpoint() {
    let (app, state, _dir) = create_test_app().await;
    seed_signals(state.signals.as_ref(), &group_signals("acme", &FOUR_GROUPS[1], 3)).await;

    let (status, body) = send(&app, "POST", "/features/regenerate", Some(json!({"scope": "acme"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scope"], "acme");
    assert_eq!(body["processed"], 3);
    assert_eq!(body["regenerated"], 3);

    let (_, body) = send(&app, "POST", "/features/regenerate", Some(json!({"scope": "acme"}))).await;
    assert_eq!(body["skipped_current"], 3);
}
