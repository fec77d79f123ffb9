// src/metrics.rs
//! Prometheus recorder and the `/metrics` route.
//!
//! The recorder is process-global; [`install`] is idempotent so every test
//! building an app in the same process shares one handle.

use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// `CRISIS_METRICS=0` disables the recorder and the route.
pub const ENV_METRICS: &str = "CRISIS_METRICS";

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub fn enabled() -> bool {
    std::env::var(ENV_METRICS)
        .map(|v| !matches!(v.trim(), "0" | "false" | "off"))
        .unwrap_or(true)
}

/// Install the recorder (once) and publish the configured cooldown.
pub fn install(cooldown_secs: i64) -> anyhow::Result<PrometheusHandle> {
    let handle = HANDLE
        .get_or_try_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .context("prometheus: install recorder")
        })?
        .clone();
    describe();
    gauge!("crisis_alert_cooldown_secs").set(cooldown_secs as f64);
    Ok(handle)
}

fn describe() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("crisis_analyses_total", "Completed analyses by level.");
        describe_counter!("crisis_alerts_total", "Analyses that decided to alert, by level.");
        describe_counter!(
            "crisis_alerts_suppressed_total",
            "Alerts suppressed by the cooldown registry, by level."
        );
        describe_counter!(
            "crisis_history_fallback_total",
            "History fetches that degraded to no context, by reason."
        );
        describe_histogram!("crisis_analysis_ms", "Full analysis time in milliseconds.");
        describe_gauge!("crisis_alert_cooldown_secs", "Configured alert cooldown.");
    });
}

/// Router exposing `/metrics` in the Prometheus exposition format.
pub fn router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let h = handle.clone();
            async move { h.render() }
        }),
    )
}
