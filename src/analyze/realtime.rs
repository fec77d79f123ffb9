// src/analyze/realtime.rs
//! Keystroke-time scan: immediate-tier keywords and phrases only, no I/O and
//! no alert registry.

use crate::analyze::matcher::{matching, normalize_text, CompiledCorpus};
use crate::assessment::{CrisisLevel, QuickAnalysis};
use crate::config::RealtimeConfig;
use crate::corpus::Tier;

pub fn quick_analyze(corpus: &CompiledCorpus, text: &str, cfg: &RealtimeConfig) -> QuickAnalysis {
    if text.trim().chars().count() < cfg.minimum_length {
        return QuickAnalysis::none();
    }
    let Some(tier) = corpus.tier(Tier::Immediate) else {
        return QuickAnalysis::none();
    };

    let normalized = normalize_text(text);
    let phrases = matching(&tier.phrases, &normalized);
    let keywords = matching(&tier.keywords, &normalized);
    let score =
        phrases.len() as f32 * cfg.phrase_weight + keywords.len() as f32 * cfg.keyword_weight;

    let level = if score >= cfg.immediate {
        CrisisLevel::Immediate
    } else if score >= cfg.concerning {
        CrisisLevel::Concerning
    } else {
        CrisisLevel::None
    };

    QuickAnalysis {
        level,
        score,
        matches: phrases
            .into_iter()
            .chain(keywords)
            .map(str::to_string)
            .collect(),
    }
}
