// src/analyze/classify.rs
//! Composite score → level / confidence / urgency.
//!
//! A hard trigger is checked before the numeric table and wins regardless of score.

use crate::assessment::{Confidence, CrisisLevel, Trigger, Urgency};
use crate::config::LevelThresholds;

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub level: CrisisLevel,
    pub confidence: Confidence,
    pub urgency: Urgency,
    pub description: &'static str,
}

pub fn classify(score: f32, triggers: &[Trigger], t: &LevelThresholds) -> Classification {
    if triggers.iter().any(|tr| tr.hard) || score >= t.immediate {
        return Classification {
            level: CrisisLevel::Immediate,
            confidence: Confidence::High,
            urgency: Urgency::Critical,
            description: "Immediate crisis indicators present",
        };
    }
    if score >= t.escalating {
        return Classification {
            level: CrisisLevel::Escalating,
            confidence: Confidence::Medium,
            urgency: Urgency::High,
            description: "Escalating distress indicators present",
        };
    }
    if score >= t.concerning {
        return Classification {
            level: CrisisLevel::Concerning,
            confidence: Confidence::Medium,
            urgency: Urgency::Moderate,
            description: "Some concerning indicators present",
        };
    }
    Classification {
        level: CrisisLevel::None,
        confidence: Confidence::Low,
        urgency: Urgency::None,
        description: "No significant crisis indicators",
    }
}
