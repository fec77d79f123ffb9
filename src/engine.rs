//! # Crisis Engine
//! Orchestrates one analysis:
//! `request → content scan → [history fetch] → fusion → classification → alert gate → recommendation`.
//!
//! The only I/O step is the history fetch, bounded by `history.timeout_ms`.
//! Everything after it is pure and runs under a panic guard: any error or panic
//! becomes `level = error` instead of escaping to the caller.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analyze::{
    classify, fuse, quick_analyze, text_stats, Classification, CompiledCorpus, ContentAnalyzer,
    Fused,
};
use crate::antiflutter::AlertRegistry;
use crate::assessment::{
    AnalysisRequest, AnalysisResult, CrisisLevel, ProtectiveFactor, QuickAnalysis, SubjectId,
    TextStats,
};
use crate::clock::{SharedClock, SystemClock};
use crate::config::{EngineConfig, LevelThresholds, MatchMode};
use crate::corpus::PatternCorpus;
use crate::history::{
    HistoricalContext, HistoryProvider, HttpHistoryProvider, InMemoryMoodHistory, NoHistory,
    ENV_HISTORY_URL,
};
use crate::notify::{AlertPayload, AlertSink, LogAlertSink};
use crate::recommend::recommend;

/// Truncated SHA-256 of `text` (12 hex chars). The only form in which subject
/// ids or entry text may reach logs.
pub fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Pure part of an analysis: no registry, no I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub raw_score: f32,
    pub fused: Fused,
    pub classification: Classification,
    pub protective_factors: Vec<ProtectiveFactor>,
    pub text_stats: TextStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastAnalysis {
    pub level: CrisisLevel,
    pub composite_score: f32,
    pub should_alert: bool,
    /// Anonymized subject hash.
    pub subject: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    pub levels: LevelThresholds,
    pub minimum_entry_length: usize,
    pub mood_threshold_score: f32,
    pub max_protective_reduction: f32,
    pub alert_cooldown_secs: i64,
    pub match_mode: MatchMode,
    pub corpus_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStats {
    pub last_analysis: Option<LastAnalysis>,
    pub active_alert_count: usize,
    pub threshold_config: ThresholdConfig,
}

pub struct CrisisEngine {
    analyzer: ContentAnalyzer,
    config: EngineConfig,
    clock: SharedClock,
    history: Arc<dyn HistoryProvider>,
    mood_store: Option<Arc<InMemoryMoodHistory>>,
    registry: AlertRegistry,
    sink: Option<Arc<dyn AlertSink>>,
    last_analysis: RwLock<Option<LastAnalysis>>,
}

/// Explicit construction: corpus, thresholds, clock, history provider, sink.
/// Unset parts fall back to the embedded corpus, default thresholds, the wall
/// clock and no history.
#[derive(Default)]
pub struct CrisisEngineBuilder {
    corpus: Option<PatternCorpus>,
    config: Option<EngineConfig>,
    clock: Option<SharedClock>,
    history: Option<Arc<dyn HistoryProvider>>,
    mood_store: Option<Arc<InMemoryMoodHistory>>,
    sink: Option<Arc<dyn AlertSink>>,
}

impl CrisisEngineBuilder {
    pub fn corpus(mut self, corpus: PatternCorpus) -> Self {
        self.corpus = Some(corpus);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn history(mut self, provider: Arc<dyn HistoryProvider>) -> Self {
        self.history = Some(provider);
        self
    }

    /// Record the mood of every analyzed request for its subject. Usually the
    /// same store is also passed to [`Self::history`].
    pub fn record_moods_into(mut self, store: Arc<InMemoryMoodHistory>) -> Self {
        self.mood_store = Some(store);
        self
    }

    pub fn alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> anyhow::Result<CrisisEngine> {
        let config = self.config.unwrap_or_default();
        config.validate().context("engine thresholds")?;
        let corpus = match self.corpus {
            Some(c) => c,
            None => PatternCorpus::embedded()?,
        };
        let compiled = CompiledCorpus::compile(&corpus, config.match_mode)
            .context("compiling pattern corpus")?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as SharedClock);
        let registry = AlertRegistry::new(config.alert_cooldown(), clock.clone());

        info!(
            target: "crisis",
            corpus_version = %compiled.version,
            match_mode = ?config.match_mode,
            cooldown_secs = config.alerts.cooldown_secs,
            "crisis engine ready"
        );

        Ok(CrisisEngine {
            analyzer: ContentAnalyzer::new(compiled),
            config,
            clock,
            history: self
                .history
                .unwrap_or_else(|| Arc::new(NoHistory) as Arc<dyn HistoryProvider>),
            mood_store: self.mood_store,
            registry,
            sink: self.sink,
            last_analysis: RwLock::new(None),
        })
    }
}

impl CrisisEngine {
    pub fn builder() -> CrisisEngineBuilder {
        CrisisEngineBuilder::default()
    }

    /// Production wiring: config and corpus from disk/env, wall clock, log sink,
    /// HTTP history when `CRISIS_HISTORY_URL` is set, otherwise the in-memory mood store.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = EngineConfig::load()?;
        let corpus = PatternCorpus::load()?;
        let clock: SharedClock = Arc::new(SystemClock);
        let threshold = config.mood.threshold_score;

        let mut builder = Self::builder()
            .corpus(corpus)
            .clock(clock.clone())
            .alert_sink(Arc::new(LogAlertSink));

        let base_url = std::env::var(ENV_HISTORY_URL)
            .ok()
            .filter(|v| !v.trim().is_empty());
        builder = match base_url {
            Some(url) => {
                info!(target: "history", "using http history provider");
                let http =
                    HttpHistoryProvider::new(url, config.history.clone(), threshold, clock)?;
                builder.history(Arc::new(http))
            }
            None => {
                let store = Arc::new(InMemoryMoodHistory::new(
                    config.history.clone(),
                    threshold,
                    clock,
                ));
                builder.history(store.clone()).record_moods_into(store)
            }
        };
        builder.config(config).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn corpus_version(&self) -> &str {
        &self.analyzer.corpus().version
    }

    pub fn registry(&self) -> &AlertRegistry {
        &self.registry
    }

    /// Full pipeline. Never fails: errors surface as `level = error`.
    pub async fn analyze_entry(&self, req: AnalysisRequest) -> AnalysisResult {
        let started = Instant::now();
        let ts = req.timestamp.unwrap_or_else(|| self.clock.now());
        let subject = req.subject_id.as_ref();
        let mood = self.sanitize_mood(req.mood);
        let text = req.text.as_str();

        let too_short = text.trim().chars().count() < self.config.minimum_entry_length;
        let result = if too_short && !self.analyzer.has_hard_trigger(text) {
            debug!(target: "crisis", chars = text.chars().count(), "entry too short, skipped");
            let mut r = AnalysisResult::too_short(ts);
            r.text_stats = Some(text_stats(text));
            r.corpus_version = Some(self.corpus_version().to_string());
            r
        } else {
            let history = match subject {
                Some(s) => self.fetch_history(s).await,
                None => None,
            };
            match self.evaluate_guarded(text, mood, history.as_ref()) {
                Ok(ev) => self.finish(ev, history, subject, ts),
                Err(e) => {
                    warn!(
                        target: "crisis",
                        error = %e,
                        subject = %subject.map(|s| anon_hash(s.as_str())).unwrap_or_default(),
                        "analysis failed, returning indeterminate result"
                    );
                    let mut r = AnalysisResult::error(format!("{e:#}"), ts);
                    r.recommendation = recommend(CrisisLevel::Error);
                    r.corpus_version = Some(self.corpus_version().to_string());
                    r
                }
            }
        };

        // After the fetch so the current entry is not counted as its own history.
        if let (Some(store), Some(s), Some(m)) = (&self.mood_store, subject, mood) {
            store.record(s, m, ts);
        }

        self.observe(&result, subject, started);
        if result.should_alert {
            self.dispatch(&result, subject).await;
        }
        result
    }

    /// Content scan, fusion and classification for one text. Pure.
    pub fn evaluate(
        &self,
        text: &str,
        mood: Option<f32>,
        history: Option<&HistoricalContext>,
    ) -> anyhow::Result<Evaluation> {
        let content = self.analyzer.analyze(text);
        let fused = fuse(
            content.triggers,
            content.raw_score,
            &content.protective_factors,
            mood,
            history,
            &self.config,
        );
        if !fused.composite_score.is_finite() {
            bail!(
                "composite score is not finite (raw {}, protective {})",
                content.raw_score,
                fused.protective_reduction
            );
        }
        let classification = classify(fused.composite_score, &fused.triggers, &self.config.levels);
        Ok(Evaluation {
            raw_score: content.raw_score,
            fused,
            classification,
            protective_factors: content.protective_factors,
            text_stats: content.text_stats,
        })
    }

    fn evaluate_guarded(
        &self,
        text: &str,
        mood: Option<f32>,
        history: Option<&HistoricalContext>,
    ) -> anyhow::Result<Evaluation> {
        match catch_unwind(AssertUnwindSafe(|| self.evaluate(text, mood, history))) {
            Ok(r) => r,
            Err(panic) => bail!("analysis panicked: {}", panic_message(panic.as_ref())),
        }
    }

    fn finish(
        &self,
        ev: Evaluation,
        history: Option<HistoricalContext>,
        subject: Option<&SubjectId>,
        ts: DateTime<Utc>,
    ) -> AnalysisResult {
        let level = ev.classification.level;
        let should_alert = self.alert_gate(level, subject);
        AnalysisResult {
            level,
            composite_score: ev.fused.composite_score,
            confidence: ev.classification.confidence,
            urgency: ev.classification.urgency,
            description: ev.classification.description.to_string(),
            triggers: ev.fused.triggers,
            protective_factors: ev.protective_factors,
            historical_pattern: history,
            should_alert,
            recommendation: recommend(level),
            text_stats: Some(ev.text_stats),
            reason: None,
            error: None,
            corpus_version: Some(self.corpus_version().to_string()),
            timestamp: ts,
        }
    }

    /// Without a subject there is nothing to dedupe against: any non-`none`
    /// level alerts and nothing is recorded.
    fn alert_gate(&self, level: CrisisLevel, subject: Option<&SubjectId>) -> bool {
        match (level, subject) {
            (CrisisLevel::None | CrisisLevel::Error, _) => false,
            (_, None) => true,
            (level, Some(s)) => {
                let fired = self.registry.try_alert(s, level);
                if !fired {
                    counter!("crisis_alerts_suppressed_total", "level" => level.as_str())
                        .increment(1);
                    debug!(
                        target: "alerts",
                        subject = %anon_hash(s.as_str()),
                        level = %level,
                        "alert suppressed by cooldown"
                    );
                }
                fired
            }
        }
    }

    async fn fetch_history(&self, subject: &SubjectId) -> Option<HistoricalContext> {
        let provider = Arc::clone(&self.history);
        let owned = subject.clone();
        // Spawned so a timed-out fetch keeps running detached instead of being dropped mid-request.
        let task = tokio::spawn(async move { provider.fetch(&owned).await });

        let reason = match tokio::time::timeout(self.config.history_timeout(), task).await {
            Ok(Ok(Ok(ctx))) => return ctx,
            Ok(Ok(Err(e))) => {
                warn!(
                    target: "history",
                    error = ?e,
                    provider = self.history.name(),
                    subject = %anon_hash(subject.as_str()),
                    "history fetch failed"
                );
                "error"
            }
            Ok(Err(join)) => {
                warn!(target: "history", error = %join, provider = self.history.name(), "history task aborted");
                "panic"
            }
            Err(_) => {
                warn!(
                    target: "history",
                    timeout_ms = self.config.history.timeout_ms,
                    provider = self.history.name(),
                    "history fetch timed out"
                );
                "timeout"
            }
        };
        counter!("crisis_history_fallback_total", "reason" => reason).increment(1);
        None
    }

    fn sanitize_mood(&self, mood: Option<f32>) -> Option<f32> {
        let m = mood?;
        if m.is_finite() && (1.0..=10.0).contains(&m) {
            Some(m)
        } else {
            warn!(target: "crisis", mood = m, "mood outside 1..=10 ignored");
            None
        }
    }

    fn observe(&self, r: &AnalysisResult, subject: Option<&SubjectId>, started: Instant) {
        let ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!("crisis_analysis_ms").record(ms);
        counter!("crisis_analyses_total", "level" => r.level.as_str()).increment(1);
        if r.should_alert {
            counter!("crisis_alerts_total", "level" => r.level.as_str()).increment(1);
        }

        let hashed = subject.map(|s| anon_hash(s.as_str()));
        info!(
            target: "crisis",
            level = %r.level,
            score = r.composite_score,
            should_alert = r.should_alert,
            triggers = r.triggers.len(),
            subject = %hashed.as_deref().unwrap_or("-"),
            ms,
            "analysis complete"
        );

        let last = LastAnalysis {
            level: r.level,
            composite_score: r.composite_score,
            should_alert: r.should_alert,
            subject: hashed,
            timestamp: r.timestamp,
        };
        *self.last_analysis.write().unwrap_or_else(|e| e.into_inner()) = Some(last);
    }

    async fn dispatch(&self, r: &AnalysisResult, subject: Option<&SubjectId>) {
        let Some(sink) = &self.sink else {
            return;
        };
        let payload = AlertPayload {
            subject_id: subject.cloned(),
            level: r.level,
            recommendation: r.recommendation.clone(),
            timestamp: r.timestamp,
        };
        if let Err(e) = sink.deliver(&payload).await {
            warn!(target: "alerts", error = ?e, sink = sink.name(), "alert delivery failed");
        }
    }

    /// Keystroke-time scan. Synchronous, touches no shared state.
    pub fn quick_analyze(&self, text: &str) -> QuickAnalysis {
        quick_analyze(self.analyzer.corpus(), text, &self.config.realtime)
    }

    /// Privacy reset: drops every alert record and every mood sample this
    /// engine recorded.
    pub fn clear_alert_history(&self) {
        let n = self.registry.len();
        self.registry.clear();
        if let Some(store) = &self.mood_store {
            store.clear();
        }
        info!(target: "alerts", cleared = n, "alert history cleared");
    }

    pub fn stats(&self) -> AnalysisStats {
        let last = self
            .last_analysis
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        AnalysisStats {
            last_analysis: last,
            active_alert_count: self.registry.active_count(),
            threshold_config: ThresholdConfig {
                levels: self.config.levels.clone(),
                minimum_entry_length: self.config.minimum_entry_length,
                mood_threshold_score: self.config.mood.threshold_score,
                max_protective_reduction: self.config.protective.max_reduction,
                alert_cooldown_secs: self.config.alerts.cooldown_secs,
                match_mode: self.config.match_mode,
                corpus_version: self.corpus_version().to_string(),
            },
        }
    }
}

fn panic_message(p: &(dyn Any + Send)) -> String {
    if let Some(s) = p.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = p.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
