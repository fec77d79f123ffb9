// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod antiflutter;
pub mod api;
pub mod assessment;
pub mod clock;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod history;
pub mod metrics;
pub mod notify;
pub mod recommend;

pub use crate::api::{router, AppState};
pub use crate::assessment::{AnalysisRequest, AnalysisResult, CrisisLevel, QuickAnalysis, SubjectId};
pub use crate::engine::{CrisisEngine, CrisisEngineBuilder};

use axum::Router;
use tracing::info;

/// Build the full HTTP app from env/config: engine routes plus `/metrics`
/// unless `CRISIS_METRICS=0`.
pub async fn app() -> anyhow::Result<Router> {
    let engine = CrisisEngine::from_env()?;
    let cooldown_secs = engine.config().alerts.cooldown_secs;
    let mut router = api::router(AppState::new(engine));
    if crate::metrics::enabled() {
        let handle = crate::metrics::install(cooldown_secs)?;
        router = router.merge(crate::metrics::router(handle));
        info!(target: "crisis", "metrics exposed on /metrics");
    }
    Ok(router)
}
