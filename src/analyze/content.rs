//! Content analyzer: scans one entry against the compiled corpus.
//!
//! Per tier, phrases and keywords are collected together; a hit contained in a
//! longer hit of the same tier is dropped so "kill myself" inside
//! "i want to kill myself" counts once. Contextual flags only count once the
//! tier has at least one keyword/phrase hit.
//!
//! Protective keywords are matched first and blanked out of the text before the
//! tier scan, so a tier pattern inside a protective keyword ("again" in
//! "try again") never adds risk.

use crate::analyze::matcher::{
    matching, normalize_text, CompiledCorpus, CompiledPattern, CompiledTier,
};
use crate::assessment::{ProtectiveFactor, TextStats, Trigger, TriggerSource};
use crate::corpus::Tier;

/// Raw output of the content scan, before fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentAnalysis {
    pub raw_score: f32,
    pub triggers: Vec<Trigger>,
    pub protective_factors: Vec<ProtectiveFactor>,
    pub text_stats: TextStats,
}

impl ContentAnalysis {
    pub fn has_hard_trigger(&self) -> bool {
        self.triggers.iter().any(|t| t.hard)
    }
}

#[derive(Debug, Clone)]
pub struct ContentAnalyzer {
    corpus: CompiledCorpus,
}

impl ContentAnalyzer {
    pub fn new(corpus: CompiledCorpus) -> Self {
        Self { corpus }
    }

    pub fn corpus(&self) -> &CompiledCorpus {
        &self.corpus
    }

    pub fn analyze(&self, text: &str) -> ContentAnalysis {
        let normalized = normalize_text(text);

        let mut masked = normalized.clone();
        let mut protective_factors = Vec::new();
        for c in &self.corpus.protective {
            let hits: Vec<&CompiledPattern> =
                c.keywords.iter().filter(|p| p.is_match(&normalized)).collect();
            if hits.is_empty() {
                continue;
            }
            for p in &hits {
                masked = p.mask(&masked);
            }
            protective_factors.push(ProtectiveFactor {
                category: c.name.clone(),
                matches: hits.iter().map(|p| p.text.clone()).collect(),
                description: c
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("Protective factor: {}", c.name)),
                weight: c.weight,
            });
        }

        let mut triggers = Vec::new();
        let mut raw_score = 0.0f32;
        for tier in &self.corpus.tiers {
            let hits = scan_tier(tier, &masked);
            if hits.matched.is_empty() {
                continue;
            }
            let subscore = hits.matched.len() as f32 * tier.weight;
            raw_score += subscore;
            let hard = tier.tier == Tier::Immediate && hits.primary > 0;
            triggers.push(
                Trigger::new(TriggerSource::Content, tier.tier, subscore)
                    .matched(hits.matched)
                    .described(tier_description(tier.tier))
                    .hard(hard),
            );
        }

        ContentAnalysis {
            raw_score,
            triggers,
            protective_factors,
            text_stats: text_stats(text),
        }
    }

    /// `normalized` with every protective keyword occurrence blanked.
    fn without_protective(&self, normalized: &str) -> String {
        self.corpus
            .protective
            .iter()
            .flat_map(|c| &c.keywords)
            .fold(normalized.to_string(), |acc, p| p.mask(&acc))
    }

    /// Cheap pre-check: does `text` hit any immediate-tier keyword or phrase?
    pub fn has_hard_trigger(&self, text: &str) -> bool {
        let Some(tier) = self.corpus.tier(Tier::Immediate) else {
            return false;
        };
        let normalized = self.without_protective(&normalize_text(text));
        tier.phrases
            .iter()
            .chain(&tier.keywords)
            .any(|p| p.is_match(&normalized))
    }
}

struct TierHits {
    matched: Vec<String>,
    /// Number of keyword/phrase hits (flags excluded).
    primary: usize,
}

fn scan_tier(tier: &CompiledTier, normalized: &str) -> TierHits {
    let mut primary: Vec<&str> = matching(&tier.phrases, normalized);
    primary.extend(matching(&tier.keywords, normalized));
    let mut matched = subsume(primary, &[]);
    let primary_count = matched.len();

    if primary_count > 0 {
        let flags = matching(&tier.contextual_flags, normalized);
        let extra = subsume(flags, &matched);
        matched.extend(extra);
    }

    TierHits {
        matched,
        primary: primary_count,
    }
}

/// Distinct hits, longest first, dropping any hit contained in a longer one
/// (either in this batch or in `already`).
fn subsume(mut hits: Vec<&str>, already: &[String]) -> Vec<String> {
    hits.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    hits.dedup();
    let mut out: Vec<String> = Vec::with_capacity(hits.len());
    for h in hits {
        let covered = already
            .iter()
            .chain(out.iter())
            .any(|longer| longer.contains(h));
        if !covered {
            out.push(h.to_string());
        }
    }
    out
}

fn tier_description(tier: Tier) -> &'static str {
    match tier {
        Tier::Immediate => "Immediate crisis language detected",
        Tier::Escalating => "Escalating distress language detected",
        Tier::Concerning => "Concerning emotional language detected",
    }
}

pub fn text_stats(text: &str) -> TextStats {
    let words = text.split_whitespace().count();
    let sentences = text
        .split(['.', '!', '?'])
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .count();
    TextStats {
        characters: text.chars().count(),
        words,
        sentences,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchMode;
    use crate::corpus::PatternCorpus;

    fn analyzer() -> ContentAnalyzer {
        let corpus = PatternCorpus::embedded().unwrap();
        ContentAnalyzer::new(CompiledCorpus::compile(&corpus, MatchMode::WordBoundary).unwrap())
    }

    fn tier_trigger(a: &ContentAnalysis, tier: Tier) -> Option<&Trigger> {
        a.triggers.iter().find(|t| t.tier == tier)
    }

    #[test]
    fn phrase_subsumes_contained_keyword() {
        let a = analyzer().analyze("I want to kill myself and I have a plan");
        let t = tier_trigger(&a, Tier::Immediate).expect("immediate trigger");
        assert_eq!(t.matched_strings, vec!["i want to kill myself", "have a plan"]);
        assert_eq!(t.subscore, 20.0);
        assert!(t.hard);
        assert!(a.has_hard_trigger());
    }

    #[test]
    fn contextual_flag_alone_does_not_count() {
        let a = analyzer().analyze("We have a plan for tonight: pizza and a movie with everyone.");
        assert!(tier_trigger(&a, Tier::Immediate).is_none());
        assert_eq!(a.raw_score, 0.0);
    }

    #[test]
    fn escalating_keywords_score_per_distinct_match() {
        let a = analyzer().analyze("I can't cope, everything is falling apart, nothing helps");
        let t = tier_trigger(&a, Tier::Escalating).unwrap();
        // "falling apart" is covered by the phrase "everything is falling apart"
        assert_eq!(t.matched_strings.len(), 3);
        assert_eq!(t.subscore, 6.0);
        assert!(!t.hard);
        assert_eq!(a.raw_score, 6.0);
    }

    #[test]
    fn repeated_keyword_counts_once() {
        let a = analyzer().analyze("sad sad sad. so sad today, sad all day long and sad tonight.");
        let t = tier_trigger(&a, Tier::Concerning).unwrap();
        assert_eq!(t.matched_strings, vec!["sad"]);
        assert_eq!(a.raw_score, 1.0);
    }

    #[test]
    fn protective_categories_recorded() {
        let a = analyzer()
            .analyze("I feel kind of down today but I went for a walk and called my friend.");
        let cats: Vec<_> = a.protective_factors.iter().map(|p| p.category.as_str()).collect();
        assert!(cats.contains(&"selfCareActions"), "{cats:?}");
        assert!(cats.contains(&"copingMentions"), "{cats:?}");
    }

    #[test]
    fn tier_patterns_inside_protective_keywords_do_not_score() {
        let an = analyzer();
        let a = an.analyze("I feel sad and lonely. Tomorrow I will try again.");
        let t = tier_trigger(&a, Tier::Concerning).unwrap();
        assert_eq!(t.matched_strings, vec!["lonely", "sad"]);
        assert_eq!(a.raw_score, 2.0);
        assert!(a.protective_factors.iter().any(|p| p.category == "problemSolving"));

        // outside a protective keyword the flag still counts
        let b = an.analyze("I feel sad and lonely. It happened again.");
        assert_eq!(b.raw_score, 3.0);
    }

    #[test]
    fn text_stats_counts() {
        let s = text_stats("One two three. Four five!  Six?");
        assert_eq!(s.words, 6);
        assert_eq!(s.sentences, 3);
        assert_eq!(s.characters, 31);
    }

    #[test]
    fn hard_trigger_precheck_ignores_flags() {
        let an = analyzer();
        assert!(an.has_hard_trigger("i want to die"));
        assert!(!an.has_hard_trigger("i have a plan"));
    }
}
