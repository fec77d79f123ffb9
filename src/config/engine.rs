// src/config/engine.rs
//! Engine thresholds loaded from `config/engine.toml`.
//!
//! Every field has a default, so the file may be partial or absent. A file that
//! is present but malformed, or whose values are inconsistent (e.g. level
//! thresholds not ascending), is a startup error.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENGINE_CONFIG_PATH: &str = "config/engine.toml";

pub const ENV_ENGINE_CONFIG_PATH: &str = "CRISIS_ENGINE_CONFIG_PATH";
pub const ENV_ALERT_COOLDOWN_SECS: &str = "CRISIS_ALERT_COOLDOWN_SECS";
pub const ENV_HISTORY_TIMEOUT_MS: &str = "CRISIS_HISTORY_TIMEOUT_MS";
pub const ENV_MATCH_MODE: &str = "CRISIS_MATCH_MODE";

/// How corpus patterns are matched against the normalized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Plain containment: "die" matches inside "diet".
    Substring,
    /// Pattern must start and end on word boundaries.
    #[default]
    WordBoundary,
}

impl MatchMode {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "substring" => Some(MatchMode::Substring),
            "word_boundary" | "word-boundary" | "word" => Some(MatchMode::WordBoundary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Entries shorter than this (in chars) are not analyzed unless they carry
    /// an immediate-tier hard trigger.
    pub minimum_entry_length: usize,
    pub match_mode: MatchMode,
    pub mood: MoodConfig,
    pub protective: ProtectiveConfig,
    pub history: HistoryConfig,
    pub levels: LevelThresholds,
    pub alerts: AlertConfig,
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MoodConfig {
    /// Mood scalars strictly below this count as low.
    pub threshold_score: f32,
    /// Points added per mood step below the threshold.
    pub adjustment_factor: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtectiveConfig {
    /// Floor of the summed protective reduction (non-positive).
    pub max_reduction: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    pub days_back: u32,
    pub minimum_entries: usize,
    pub mood_threshold_days: u32,
    /// Half-over-half mean change needed to call a trend declining/improving.
    pub trend_delta: f32,
    pub declining_boost: f32,
    pub low_mood_boost: f32,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LevelThresholds {
    pub immediate: f32,
    pub escalating: f32,
    pub concerning: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertConfig {
    pub cooldown_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RealtimeConfig {
    pub minimum_length: usize,
    pub keyword_weight: f32,
    pub phrase_weight: f32,
    pub immediate: f32,
    pub concerning: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            minimum_entry_length: 50,
            match_mode: MatchMode::default(),
            mood: MoodConfig::default(),
            protective: ProtectiveConfig::default(),
            history: HistoryConfig::default(),
            levels: LevelThresholds::default(),
            alerts: AlertConfig::default(),
            realtime: RealtimeConfig::default(),
        }
    }
}

impl Default for MoodConfig {
    fn default() -> Self {
        Self {
            threshold_score: 3.0,
            adjustment_factor: 1.5,
        }
    }
}

impl Default for ProtectiveConfig {
    fn default() -> Self {
        Self { max_reduction: -4.0 }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            days_back: 14,
            minimum_entries: 3,
            mood_threshold_days: 7,
            trend_delta: 1.0,
            declining_boost: 2.0,
            low_mood_boost: 3.0,
            timeout_ms: 1_500,
        }
    }
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            immediate: 8.0,
            escalating: 6.0,
            concerning: 4.0,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 24 * 3600,
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            minimum_length: 20,
            keyword_weight: 5.0,
            phrase_weight: 8.0,
            immediate: 8.0,
            concerning: 4.0,
        }
    }
}

impl EngineConfig {
    /// Resolve `CRISIS_ENGINE_CONFIG_PATH` or `config/engine.toml`, then apply env overrides.
    /// A missing default file falls back to built-in defaults; a missing explicit path is an error.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(ENV_ENGINE_CONFIG_PATH) {
            Ok(p) => Self::load_from(Path::new(&p))?,
            Err(_) => {
                let default = PathBuf::from(DEFAULT_ENGINE_CONFIG_PATH);
                if default.exists() {
                    Self::load_from(&default)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading engine config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid engine config at {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let cfg: EngineConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Some(raw) = env_nonempty(ENV_ALERT_COOLDOWN_SECS) {
            self.alerts.cooldown_secs = raw
                .parse()
                .with_context(|| format!("{ENV_ALERT_COOLDOWN_SECS}={raw} is not an integer"))?;
        }
        if let Some(raw) = env_nonempty(ENV_HISTORY_TIMEOUT_MS) {
            self.history.timeout_ms = raw
                .parse()
                .with_context(|| format!("{ENV_HISTORY_TIMEOUT_MS}={raw} is not an integer"))?;
        }
        if let Some(raw) = env_nonempty(ENV_MATCH_MODE) {
            match MatchMode::parse(&raw) {
                Some(m) => self.match_mode = m,
                None => bail!("{ENV_MATCH_MODE}={raw} must be `substring` or `word_boundary`"),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let l = &self.levels;
        let finite = [l.concerning, l.escalating, l.immediate]
            .iter()
            .all(|v| v.is_finite());
        if !finite || !(0.0 < l.concerning && l.concerning < l.escalating && l.escalating < l.immediate)
        {
            bail!(
                "level thresholds must be positive and ascending (concerning {} < escalating {} < immediate {})",
                l.concerning,
                l.escalating,
                l.immediate
            );
        }
        if !self.protective.max_reduction.is_finite() || self.protective.max_reduction > 0.0 {
            bail!(
                "protective.max_reduction must be <= 0, got {}",
                self.protective.max_reduction
            );
        }
        if !(1.0..=10.0).contains(&self.mood.threshold_score) {
            bail!(
                "mood.threshold_score must be within 1..=10, got {}",
                self.mood.threshold_score
            );
        }
        if !self.mood.adjustment_factor.is_finite() || self.mood.adjustment_factor < 0.0 {
            bail!("mood.adjustment_factor must be >= 0");
        }
        if self.alerts.cooldown_secs <= 0 {
            bail!("alerts.cooldown_secs must be > 0, got {}", self.alerts.cooldown_secs);
        }
        if self.history.days_back == 0 || self.history.minimum_entries == 0 {
            bail!("history.days_back and history.minimum_entries must be > 0");
        }
        let h = &self.history;
        if [h.trend_delta, h.declining_boost, h.low_mood_boost]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            bail!("history trend_delta/declining_boost/low_mood_boost must be >= 0");
        }
        let r = &self.realtime;
        if !(0.0 < r.concerning && r.concerning < r.immediate) {
            bail!("realtime thresholds must satisfy 0 < concerning < immediate");
        }
        Ok(())
    }

    pub fn alert_cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.alerts.cooldown_secs)
    }

    pub fn history_timeout(&self) -> Duration {
        Duration::from_millis(self.history.timeout_ms)
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
