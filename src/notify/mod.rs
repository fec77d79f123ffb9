// src/notify/mod.rs
//! Alert sink: receives `{subject, level, recommendation}` whenever an analysis
//! decides to alert. Delivery to people (banner, hotline routing) lives
//! outside this crate; the only built-in sink writes a structured log line.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::assessment::{CrisisLevel, SubjectId};
use crate::engine::anon_hash;
use crate::recommend::RecommendationBundle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    /// Absent when the request carried no subject id.
    pub subject_id: Option<SubjectId>,
    pub level: CrisisLevel,
    pub recommendation: Option<RecommendationBundle>,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, alert: &AlertPayload) -> anyhow::Result<()>;
    fn name(&self) -> &'static str;
}

/// Emits one `warn!` per alert under target `alerts`. Never logs the raw subject id.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn deliver(&self, alert: &AlertPayload) -> anyhow::Result<()> {
        let subject = alert
            .subject_id
            .as_ref()
            .map(|s| anon_hash(s.as_str()))
            .unwrap_or_else(|| "-".to_string());
        let resource = alert
            .recommendation
            .as_ref()
            .map(|r| format!("{:?}", r.primary_resource_category))
            .unwrap_or_default();
        warn!(
            target: "alerts",
            subject = %subject,
            level = %alert.level,
            resource = %resource,
            ts = %alert.timestamp.to_rfc3339(),
            "crisis alert"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
