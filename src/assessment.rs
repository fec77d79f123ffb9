//! assessment.rs: request/result shapes for one crisis-risk analysis.
//!
//! Everything here is plain data with serde derives so the HTTP layer and the
//! alerting layer can consume `AnalysisResult` as JSON (camelCase fields).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::corpus::Tier;
use crate::history::HistoricalContext;
use crate::recommend::RecommendationBundle;

/// Opaque identifier grouping analyses and alert history for one end user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Discrete intervention level assigned to one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrisisLevel {
    None,
    Concerning,
    Escalating,
    Immediate,
    /// Indeterminate: the pipeline failed. Never the same thing as `None`.
    Error,
}

impl CrisisLevel {
    /// Severity rank for ordering comparisons. `Error` has no rank.
    pub fn rank(self) -> Option<u8> {
        match self {
            CrisisLevel::None => Some(0),
            CrisisLevel::Concerning => Some(1),
            CrisisLevel::Escalating => Some(2),
            CrisisLevel::Immediate => Some(3),
            CrisisLevel::Error => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CrisisLevel::None => "none",
            CrisisLevel::Concerning => "concerning",
            CrisisLevel::Escalating => "escalating",
            CrisisLevel::Immediate => "immediate",
            CrisisLevel::Error => "error",
        }
    }
}

impl From<Tier> for CrisisLevel {
    fn from(t: Tier) -> Self {
        match t {
            Tier::Immediate => CrisisLevel::Immediate,
            Tier::Escalating => CrisisLevel::Escalating,
            Tier::Concerning => CrisisLevel::Concerning,
        }
    }
}

impl fmt::Display for CrisisLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    None,
    Moderate,
    High,
    Critical,
}

/// Where a trigger came from: the text itself or one of the fused signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Content,
    Mood,
    History,
}

/// One scored reason contributing to the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub source: TriggerSource,
    /// Severity tier the trigger is tagged with.
    pub tier: Tier,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_strings: Vec<String>,
    pub subscore: f32,
    pub description: String,
    /// Set only for immediate-tier keyword/phrase matches; forces `Immediate`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hard: bool,
}

impl Trigger {
    pub fn new(source: TriggerSource, tier: Tier, subscore: f32) -> Self {
        Self {
            source,
            tier,
            matched_strings: Vec::new(),
            subscore,
            description: String::new(),
            hard: false,
        }
    }

    pub fn matched(mut self, matched: Vec<String>) -> Self {
        self.matched_strings = matched;
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn hard(mut self, hard: bool) -> Self {
        self.hard = hard;
        self
    }
}

/// A protective-factor category that matched at least once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectiveFactor {
    pub category: String,
    pub matches: Vec<String>,
    pub description: String,
    pub weight: f32,
}

/// Character, word and sentence counts of the normalized entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStats {
    pub characters: usize,
    pub words: usize,
    pub sentences: usize,
}

/// Input from the journaling/chat layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub text: String,
    /// Self-reported mood, 1 (worst) ..= 10 (best).
    #[serde(default)]
    pub mood: Option<f32>,
    /// Self-reported energy, 1 ..= 10. Carried for the caller; not scored.
    #[serde(default)]
    pub energy: Option<f32>,
    #[serde(default)]
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl AnalysisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_mood(mut self, mood: f32) -> Self {
        self.mood = Some(mood);
        self
    }

    pub fn with_energy(mut self, energy: f32) -> Self {
        self.energy = Some(energy);
        self
    }

    pub fn for_subject(mut self, id: impl Into<SubjectId>) -> Self {
        self.subject_id = Some(id.into());
        self
    }

    pub fn at(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }
}

pub const REASON_ENTRY_TOO_SHORT: &str = "entry_too_short";

/// Output to the UI/alerting layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub level: CrisisLevel,
    pub composite_score: f32,
    pub confidence: Confidence,
    pub urgency: Urgency,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub protective_factors: Vec<ProtectiveFactor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical_pattern: Option<HistoricalContext>,
    pub should_alert: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<RecommendationBundle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_stats: Option<TextStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corpus_version: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisResult {
    fn bare(level: CrisisLevel, timestamp: DateTime<Utc>) -> Self {
        Self {
            level,
            composite_score: 0.0,
            confidence: Confidence::Low,
            urgency: Urgency::None,
            description: String::new(),
            triggers: Vec::new(),
            protective_factors: Vec::new(),
            historical_pattern: None,
            should_alert: false,
            recommendation: None,
            text_stats: None,
            reason: None,
            error: None,
            corpus_version: None,
            timestamp,
        }
    }

    /// Short-circuit result for entries below the minimum length.
    pub fn too_short(timestamp: DateTime<Utc>) -> Self {
        let mut r = Self::bare(CrisisLevel::None, timestamp);
        r.reason = Some(REASON_ENTRY_TOO_SHORT.to_string());
        r.description = "Entry too short for analysis".to_string();
        r
    }

    /// Indeterminate result; callers must not read it as "no risk".
    pub fn error(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        let mut r = Self::bare(CrisisLevel::Error, timestamp);
        r.error = Some(message.into());
        r.description = "Analysis could not be completed".to_string();
        r
    }
}

/// Result of the real-time analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickAnalysis {
    pub level: CrisisLevel,
    pub score: f32,
    #[serde(default)]
    pub matches: Vec<String>,
}

impl QuickAnalysis {
    pub fn none() -> Self {
        Self {
            level: CrisisLevel::None,
            score: 0.0,
            matches: Vec::new(),
        }
    }
}
