//! history.rs: historical mood context for a subject.
//!
//! The engine only sees [`HistoryProvider::fetch`]. Providers that hold raw
//! mood samples reduce them with [`summarize`]:
//!
//! 1. keep samples from the last `days_back` days; fewer than `minimum_entries` → no context
//! 2. `average_mood_scalar` = mean of kept samples
//! 3. `recent_trend`: mean of the newer half minus mean of the older half
//!    (an odd middle sample belongs to the newer half), compared to `±trend_delta`
//! 4. `pattern`: `Declining` when the latest run of consecutive UTC days whose
//!    daily mean is below the mood threshold is at least `mood_threshold_days`
//!    long (a day without samples breaks the run), otherwise `recent_trend`

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use reqwest::Url;
use std::time::Duration as StdDuration;

use crate::assessment::SubjectId;
use crate::clock::SharedClock;
use crate::config::HistoryConfig;

/// Base URL of the persistence service; selects [`HttpHistoryProvider`].
pub const ENV_HISTORY_URL: &str = "CRISIS_HISTORY_URL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Stable,
    Declining,
    Improving,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalContext {
    pub pattern: Trend,
    pub average_mood_scalar: f32,
    pub recent_trend: Trend,
    pub days_analyzed: usize,
    pub entries_analyzed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoodSample {
    pub at: DateTime<Utc>,
    pub mood: f32,
}

impl MoodSample {
    pub fn new(at: DateTime<Utc>, mood: f32) -> Self {
        Self { at, mood }
    }
}

/// Reduce raw samples to a context, or `None` when there is not enough data.
pub fn summarize(
    samples: &[MoodSample],
    now: DateTime<Utc>,
    cfg: &HistoryConfig,
    mood_threshold: f32,
) -> Option<HistoricalContext> {
    let cutoff = now - Duration::days(i64::from(cfg.days_back));
    let mut window: Vec<MoodSample> = samples
        .iter()
        .copied()
        .filter(|s| s.at >= cutoff && s.at <= now && s.mood.is_finite())
        .collect();
    if window.is_empty() || window.len() < cfg.minimum_entries {
        return None;
    }
    window.sort_by_key(|s| s.at);

    let average = mean(window.iter().map(|s| s.mood));

    let mid = window.len() / 2;
    let recent_trend = if mid == 0 {
        Trend::Stable
    } else {
        let older = mean(window[..mid].iter().map(|s| s.mood));
        let newer = mean(window[mid..].iter().map(|s| s.mood));
        classify_delta(newer - older, cfg.trend_delta)
    };

    let mut daily: BTreeMap<NaiveDate, (f32, u32)> = BTreeMap::new();
    for s in &window {
        let e = daily.entry(s.at.date_naive()).or_insert((0.0, 0));
        e.0 += s.mood;
        e.1 += 1;
    }

    let low_run = latest_low_run(&daily, mood_threshold);
    let pattern = if low_run >= cfg.mood_threshold_days {
        Trend::Declining
    } else {
        recent_trend
    };

    Some(HistoricalContext {
        pattern,
        average_mood_scalar: average,
        recent_trend,
        days_analyzed: daily.len(),
        entries_analyzed: window.len(),
    })
}

fn classify_delta(delta: f32, threshold: f32) -> Trend {
    if delta < 0.0 && delta <= -threshold {
        Trend::Declining
    } else if delta > 0.0 && delta >= threshold {
        Trend::Improving
    } else {
        Trend::Stable
    }
}

/// Length of the most recent run of consecutive days with a daily mean below `threshold`.
fn latest_low_run(daily: &BTreeMap<NaiveDate, (f32, u32)>, threshold: f32) -> u32 {
    let mut run = 0u32;
    let mut expected: Option<NaiveDate> = None;
    for (day, (sum, n)) in daily.iter().rev() {
        if expected.is_some_and(|exp| exp != *day) {
            break;
        }
        if sum / *n as f32 >= threshold {
            break;
        }
        run += 1;
        expected = day.pred_opt();
    }
    run
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, n) = values.fold((0.0f32, 0u32), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f32
    }
}

/// Supplies historical context for a subject. Implementations may fail; the
/// engine treats failure and timeout as "no context".
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    async fn fetch(&self, subject: &SubjectId) -> anyhow::Result<Option<HistoricalContext>>;
    fn name(&self) -> &'static str;
}

/// Provider that never has history.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

#[async_trait]
impl HistoryProvider for NoHistory {
    async fn fetch(&self, _subject: &SubjectId) -> anyhow::Result<Option<HistoricalContext>> {
        Ok(None)
    }
    fn name(&self) -> &'static str {
        "none"
    }
}

/// Process-local mood store: the mood of each analyzed entry is recorded here
/// and summarized on fetch. Bounded per subject; every write drops samples older
/// than `days_back` and subjects left without samples.
pub struct InMemoryMoodHistory {
    samples: DashMap<SubjectId, VecDeque<MoodSample>>,
    cap_per_subject: usize,
    cfg: HistoryConfig,
    mood_threshold: f32,
    clock: SharedClock,
}

impl InMemoryMoodHistory {
    pub fn new(cfg: HistoryConfig, mood_threshold: f32, clock: SharedClock) -> Self {
        Self {
            samples: DashMap::new(),
            cap_per_subject: 500,
            cfg,
            mood_threshold,
            clock,
        }
    }

    pub fn with_capacity(mut self, cap_per_subject: usize) -> Self {
        self.cap_per_subject = cap_per_subject.clamp(1, 10_000);
        self
    }

    pub fn record(&self, subject: &SubjectId, mood: f32, at: DateTime<Utc>) {
        if !mood.is_finite() {
            return;
        }
        let cutoff = self.cutoff();
        if at >= cutoff {
            let mut buf = self.samples.entry(subject.clone()).or_default();
            buf.push_back(MoodSample::new(at, mood));
            while buf.len() > self.cap_per_subject {
                buf.pop_front();
            }
        }
        // entry guard is released above; retain takes every shard lock
        self.evict_before(cutoff);
    }

    fn cutoff(&self) -> DateTime<Utc> {
        self.clock.now() - Duration::days(i64::from(self.cfg.days_back))
    }

    fn evict_before(&self, cutoff: DateTime<Utc>) {
        self.samples.retain(|_, buf| {
            buf.retain(|s| s.at >= cutoff);
            !buf.is_empty()
        });
    }

    /// Drop everything stored for one subject.
    pub fn forget(&self, subject: &SubjectId) {
        self.samples.remove(subject);
    }

    /// Privacy reset: drop every stored sample.
    pub fn clear(&self) {
        self.samples.clear();
    }

    pub fn subject_count(&self) -> usize {
        self.samples.len()
    }

    pub fn len(&self, subject: &SubjectId) -> usize {
        self.samples.get(subject).map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn snapshot(&self, subject: &SubjectId) -> Vec<MoodSample> {
        self.samples
            .get(subject)
            .map(|b| b.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HistoryProvider for InMemoryMoodHistory {
    async fn fetch(&self, subject: &SubjectId) -> anyhow::Result<Option<HistoricalContext>> {
        let samples = self.snapshot(subject);
        Ok(summarize(
            &samples,
            self.clock.now(),
            &self.cfg,
            self.mood_threshold,
        ))
    }
    fn name(&self) -> &'static str {
        "in_memory"
    }
}

/// Fetches raw mood samples from the persistence service:
/// `GET {base_url}/subjects/{id}/moods?days={days_back}` → `[{"at": "...", "mood": 4.0}, ...]`.
pub struct HttpHistoryProvider {
    http: reqwest::Client,
    base_url: Url,
    cfg: HistoryConfig,
    mood_threshold: f32,
    clock: SharedClock,
}

impl HttpHistoryProvider {
    pub fn new(
        base_url: impl Into<String>,
        cfg: HistoryConfig,
        mood_threshold: f32,
        clock: SharedClock,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("crisis-risk-analyzer/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(StdDuration::from_secs(2))
            .timeout(StdDuration::from_millis(cfg.timeout_ms.max(1)))
            .build()
            .context("building history http client")?;
        let base_url = base_url.into();
        let base_url = Url::parse(&base_url)
            .with_context(|| format!("history base url `{base_url}` is not a valid url"))?;
        if base_url.cannot_be_a_base() {
            bail!("history base url `{base_url}` cannot take path segments");
        }
        Ok(Self {
            http,
            base_url,
            cfg,
            mood_threshold,
            clock,
        })
    }

    /// Subject ids are pushed as single path segments, so `/` and spaces are escaped.
    fn url_for(&self, subject: &SubjectId) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("history base url cannot take path segments"))?
            .pop_if_empty()
            .extend(["subjects", subject.as_str(), "moods"]);
        url.query_pairs_mut()
            .append_pair("days", &self.cfg.days_back.to_string());
        Ok(url)
    }
}

#[async_trait]
impl HistoryProvider for HttpHistoryProvider {
    async fn fetch(&self, subject: &SubjectId) -> anyhow::Result<Option<HistoricalContext>> {
        let samples: Vec<MoodSample> = self
            .http
            .get(self.url_for(subject)?)
            .send()
            .await
            .context("history request")?
            .error_for_status()
            .context("history non-2xx")?
            .json()
            .await
            .context("history body is not a mood sample list")?;
        Ok(summarize(
            &samples,
            self.clock.now(),
            &self.cfg,
            self.mood_threshold,
        ))
    }
    fn name(&self) -> &'static str {
        "http"
    }
}
