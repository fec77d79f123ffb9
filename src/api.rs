// src/api.rs
//! HTTP surface over [`CrisisEngine`].

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::assessment::{AnalysisRequest, AnalysisResult, QuickAnalysis};
use crate::engine::{AnalysisStats, CrisisEngine};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CrisisEngine>,
}

impl AppState {
    pub fn new(engine: CrisisEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/analyze", post(analyze))
        .route("/analyze/quick", post(analyze_quick))
        .route("/stats", get(stats))
        .route("/admin/clear-alerts", post(clear_alerts))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>,
) -> Json<AnalysisResult> {
    Json(state.engine.analyze_entry(req).await)
}

#[derive(serde::Deserialize)]
struct QuickReq {
    text: String,
}

async fn analyze_quick(
    State(state): State<AppState>,
    Json(body): Json<QuickReq>,
) -> Json<QuickAnalysis> {
    Json(state.engine.quick_analyze(&body.text))
}

async fn stats(State(state): State<AppState>) -> Json<AnalysisStats> {
    Json(state.engine.stats())
}

async fn clear_alerts(State(state): State<AppState>) -> StatusCode {
    state.engine.clear_alert_history();
    StatusCode::NO_CONTENT
}
