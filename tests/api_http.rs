// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /analyze (immediate, too short, malformed body)
// - POST /analyze/quick
// - GET /stats
// - POST /admin/clear-alerts

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use crisis_risk_analyzer::clock::ManualClock;
use crisis_risk_analyzer::{router, AppState, CrisisEngine};

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router() -> Router {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap(),
    ));
    let engine = CrisisEngine::builder()
        .clock(clock)
        .build()
        .expect("engine builds");
    router(AppState::new(engine))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

fn post_json(uri: &str, payload: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

#[tokio::test]
async fn health_returns_ok() {
    let app = test_router();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), "ok");
}

#[tokio::test]
async fn analyze_returns_camel_case_result() {
    let app = test_router();
    let payload = json!({
        "text": "I want to kill myself and I have a plan",
        "subjectId": "api-1",
        "mood": 2
    });
    let (status, body) = send(&app, post_json("/analyze", &payload)).await;
    assert_eq!(status, StatusCode::OK);

    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["level"], "immediate");
    assert_eq!(v["shouldAlert"], true);
    assert_eq!(v["urgency"], "critical");
    assert!(v["compositeScore"].as_f64().unwrap() >= 8.0);
    assert_eq!(v["triggers"][0]["hard"], true);
    assert_eq!(
        v["recommendation"]["primaryResourceCategory"],
        "crisis_hotline"
    );
    assert!(v.get("error").is_none());
}

#[tokio::test]
async fn analyze_short_entry_reports_reason() {
    let app = test_router();
    let (status, body) = send(&app, post_json("/analyze", &json!({ "text": "meh" }))).await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["level"], "none");
    assert_eq!(v["reason"], "entry_too_short");
    assert_eq!(v["compositeScore"], 0.0);
}

#[tokio::test]
async fn analyze_rejects_malformed_body() {
    let app = test_router();
    let req = Request::builder()
        .method("POST")
        .uri("/analyze")
        .header("content-type", "application/json")
        .body(Body::from("{\"txt\": 1"))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert!(status.is_client_error(), "got {status}");
}

#[tokio::test]
async fn quick_analyze_endpoint() {
    let app = test_router();
    let (status, body) = send(
        &app,
        post_json("/analyze/quick", &json!({ "text": "I want to kill myself" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["level"], "immediate");
    assert!(v["matches"].as_array().unwrap().len() >= 1);
}

#[tokio::test]
async fn stats_and_clear_alerts() {
    let app = test_router();
    let payload = json!({
        "text": "I can't cope, everything is falling apart, nothing helps",
        "subjectId": "api-2"
    });
    let (status, _) = send(&app, post_json("/analyze", &payload)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get("/stats")).await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["lastAnalysis"]["level"], "escalating");
    assert_eq!(v["activeAlertCount"], 1);
    assert_eq!(v["thresholdConfig"]["levels"]["immediate"], 8.0);
    assert_eq!(v["thresholdConfig"]["alertCooldownSecs"], 86_400);
    // the raw subject id never leaves the engine
    assert_ne!(v["lastAnalysis"]["subject"], "api-2");

    let req = Request::builder()
        .method("POST")
        .uri("/admin/clear-alerts")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, get("/stats")).await;
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["activeAlertCount"], 0);
}
