//! Crisis-risk analysis service: binary entrypoint.
//! Boots the Axum HTTP server on Shuttle.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - CRISIS_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("CRISIS_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("crisis=info,alerts=info,history=info,corpus=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // .env is optional; CRISIS_* overrides may come from it in local runs.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let router = crisis_risk_analyzer::app()
        .await
        .map_err(shuttle_runtime::Error::Custom)?;

    Ok(router.into())
}
