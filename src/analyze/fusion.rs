// src/analyze/fusion.rs
//! Score fusion: content score + protective dampening + mood + history.
//!
//! composite = max(0, raw + protective + mood + history)
//!
//! - protective: sum of matched category weights, floored at `max_reduction`
//! - mood: `(threshold - mood) * adjustment_factor` when mood < threshold
//! - history: `declining_boost` on a declining recent trend, plus
//!   `low_mood_boost` when the historical average is below the mood threshold

use crate::assessment::{ProtectiveFactor, Trigger, TriggerSource};
use crate::config::EngineConfig;
use crate::corpus::Tier;
use crate::history::{HistoricalContext, Trend};

pub const LOW_MOOD: &str = "low mood score";
pub const DECLINING_PATTERN: &str = "declining pattern over recent entries";
pub const CONSISTENTLY_LOW_MOOD: &str = "consistently low mood over time";

#[derive(Debug, Clone, PartialEq)]
pub struct Fused {
    pub composite_score: f32,
    /// Content triggers first, then synthetic mood/history triggers.
    pub triggers: Vec<Trigger>,
    pub protective_reduction: f32,
    pub mood_adjustment: f32,
    pub historical_adjustment: f32,
}

/// Bounded protective reduction, always in `max_reduction..=0`.
pub fn protective_reduction(factors: &[ProtectiveFactor], max_reduction: f32) -> f32 {
    let sum: f32 = factors.iter().map(|f| f.weight).sum();
    sum.max(max_reduction).min(0.0)
}

pub fn fuse(
    content_triggers: Vec<Trigger>,
    raw_score: f32,
    protective: &[ProtectiveFactor],
    mood: Option<f32>,
    history: Option<&HistoricalContext>,
    cfg: &EngineConfig,
) -> Fused {
    let mut triggers = content_triggers;
    let reduction = protective_reduction(protective, cfg.protective.max_reduction);

    let threshold = cfg.mood.threshold_score;
    let mut mood_adjustment = 0.0;
    if let Some(m) = mood.filter(|m| *m < threshold) {
        mood_adjustment = (threshold - m) * cfg.mood.adjustment_factor;
        triggers.push(
            Trigger::new(TriggerSource::Mood, Tier::Concerning, mood_adjustment)
                .described(LOW_MOOD),
        );
    }

    let mut historical_adjustment = 0.0;
    if let Some(h) = history {
        if h.recent_trend == Trend::Declining {
            let boost = cfg.history.declining_boost;
            historical_adjustment += boost;
            triggers.push(
                Trigger::new(TriggerSource::History, Tier::Escalating, boost)
                    .described(DECLINING_PATTERN),
            );
        }
        if h.average_mood_scalar < threshold {
            let boost = cfg.history.low_mood_boost;
            historical_adjustment += boost;
            triggers.push(
                Trigger::new(TriggerSource::History, Tier::Escalating, boost)
                    .described(CONSISTENTLY_LOW_MOOD),
            );
        }
    }

    let composite = raw_score + reduction + mood_adjustment + historical_adjustment;
    Fused {
        composite_score: if composite.is_nan() { 0.0 } else { composite.max(0.0) },
        triggers,
        protective_reduction: reduction,
        mood_adjustment,
        historical_adjustment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factor(category: &str) -> ProtectiveFactor {
        ProtectiveFactor {
            category: category.to_string(),
            matches: vec!["x".into()],
            description: String::new(),
            weight: -2.0,
        }
    }

    fn ctx(recent: Trend, avg: f32) -> HistoricalContext {
        HistoricalContext {
            pattern: recent,
            average_mood_scalar: avg,
            recent_trend: recent,
            days_analyzed: 5,
            entries_analyzed: 5,
        }
    }

    #[test]
    fn protective_reduction_is_floored() {
        let f = [factor("a"), factor("b"), factor("c")];
        assert_eq!(protective_reduction(&f, -4.0), -4.0);
        assert_eq!(protective_reduction(&f[..1], -4.0), -2.0);
        assert_eq!(protective_reduction(&[], -4.0), 0.0);
    }

    #[test]
    fn score_never_negative() {
        let f = fuse(vec![], 1.0, &[factor("a"), factor("b")], None, None, &EngineConfig::default());
        assert_eq!(f.composite_score, 0.0);
        assert_eq!(f.protective_reduction, -4.0);
    }

    #[test]
    fn low_mood_adds_scaled_term_and_trigger() {
        let cfg = EngineConfig::default();
        let f = fuse(vec![], 6.0, &[], Some(2.0), None, &cfg);
        assert_eq!(f.mood_adjustment, 1.5);
        assert_eq!(f.composite_score, 7.5);
        assert_eq!(f.triggers.len(), 1);
        assert_eq!(f.triggers[0].source, TriggerSource::Mood);
        assert_eq!(f.triggers[0].tier, Tier::Concerning);
        assert_eq!(f.triggers[0].description, LOW_MOOD);

        // at or above threshold: no term
        let g = fuse(vec![], 6.0, &[], Some(3.0), None, &cfg);
        assert_eq!(g.composite_score, 6.0);
        assert!(g.triggers.is_empty());
    }

    #[test]
    fn both_history_terms_may_apply_in_order() {
        let cfg = EngineConfig::default();
        let h = ctx(Trend::Declining, 2.5);
        let f = fuse(vec![], 0.0, &[], None, Some(&h), &cfg);
        assert_eq!(f.historical_adjustment, 5.0);
        let d: Vec<_> = f.triggers.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(d, vec![DECLINING_PATTERN, CONSISTENTLY_LOW_MOOD]);
        assert!(f.triggers.iter().all(|t| t.tier == Tier::Escalating));
    }

    #[test]
    fn stable_history_with_normal_average_adds_nothing() {
        let h = ctx(Trend::Stable, 6.0);
        let f = fuse(vec![], 2.0, &[], None, Some(&h), &EngineConfig::default());
        assert_eq!(f.composite_score, 2.0);
        assert!(f.triggers.is_empty());
    }
}
