//! Compiled corpus patterns.
//!
//! Patterns are normalized at corpus load; input text is normalized once per
//! analysis with [`normalize_text`]. In `WordBoundary` mode each pattern is
//! compiled to an anchored regex, so matching is a single `is_match` per pattern.

use anyhow::Context;
use regex::Regex;

use crate::config::MatchMode;
use crate::corpus::{PatternCorpus, Tier};

pub use crate::corpus::normalize_text;

#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub text: String,
    re: Option<Regex>,
}

impl CompiledPattern {
    pub fn compile(text: &str, mode: MatchMode) -> anyhow::Result<Self> {
        let re = match mode {
            MatchMode::Substring => None,
            MatchMode::WordBoundary => Some(
                Regex::new(&boundary_pattern(text))
                    .with_context(|| format!("pattern `{text}` regex error"))?,
            ),
        };
        Ok(Self {
            text: text.to_string(),
            re,
        })
    }

    /// `normalized` must already be passed through [`normalize_text`].
    pub fn is_match(&self, normalized: &str) -> bool {
        match &self.re {
            Some(re) => re.is_match(normalized),
            None => normalized.contains(self.text.as_str()),
        }
    }

    /// Blank every occurrence with spaces of the same byte length, so no other
    /// pattern can match inside it.
    pub fn mask(&self, normalized: &str) -> String {
        let blank = " ".repeat(self.text.len());
        match &self.re {
            Some(re) => re.replace_all(normalized, blank.as_str()).into_owned(),
            None => normalized.replace(self.text.as_str(), &blank),
        }
    }
}

/// Escape `p` and add `\b` only on sides that end in a word character;
/// `\b` next to punctuation would never match where expected.
fn boundary_pattern(p: &str) -> String {
    let escaped = regex::escape(p);
    let head = p.chars().next().is_some_and(is_word_char);
    let tail = p.chars().last().is_some_and(is_word_char);
    format!(
        "{}{}{}",
        if head { r"\b" } else { "" },
        escaped,
        if tail { r"\b" } else { "" }
    )
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[derive(Debug, Clone)]
pub struct CompiledTier {
    pub tier: Tier,
    pub weight: f32,
    pub keywords: Vec<CompiledPattern>,
    pub phrases: Vec<CompiledPattern>,
    pub contextual_flags: Vec<CompiledPattern>,
}

#[derive(Debug, Clone)]
pub struct CompiledCategory {
    pub name: String,
    pub description: Option<String>,
    pub weight: f32,
    pub keywords: Vec<CompiledPattern>,
}

#[derive(Debug, Clone)]
pub struct CompiledCorpus {
    pub version: String,
    pub mode: MatchMode,
    pub tiers: Vec<CompiledTier>,
    pub protective: Vec<CompiledCategory>,
}

impl CompiledCorpus {
    pub fn compile(corpus: &PatternCorpus, mode: MatchMode) -> anyhow::Result<Self> {
        let list = |v: &[String]| -> anyhow::Result<Vec<CompiledPattern>> {
            v.iter().map(|p| CompiledPattern::compile(p, mode)).collect()
        };

        // Fixed severity order regardless of file order.
        let mut tiers = Vec::with_capacity(Tier::ALL.len());
        for tier in Tier::ALL {
            if let Some(set) = corpus.tier(tier) {
                tiers.push(CompiledTier {
                    tier,
                    weight: set.weight,
                    keywords: list(&set.keywords)?,
                    phrases: list(&set.phrases)?,
                    contextual_flags: list(&set.contextual_flags)?,
                });
            }
        }

        let protective = corpus
            .protective
            .iter()
            .map(|c| {
                Ok(CompiledCategory {
                    name: c.name.clone(),
                    description: c.description.clone(),
                    weight: c.weight,
                    keywords: list(&c.keywords)?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            version: corpus.version.clone(),
            mode,
            tiers,
            protective,
        })
    }

    pub fn tier(&self, tier: Tier) -> Option<&CompiledTier> {
        self.tiers.iter().find(|t| t.tier == tier)
    }
}

/// Texts of all patterns in `patterns` that match `normalized`.
pub fn matching<'a>(patterns: &'a [CompiledPattern], normalized: &str) -> Vec<&'a str> {
    patterns
        .iter()
        .filter(|p| p.is_match(normalized))
        .map(|p| p.text.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_boundary_skips_embedded_words() {
        let p = CompiledPattern::compile("die", MatchMode::WordBoundary).unwrap();
        assert!(!p.is_match("starting a new diet"));
        assert!(p.is_match("i could just die"));

        let s = CompiledPattern::compile("die", MatchMode::Substring).unwrap();
        assert!(s.is_match("starting a new diet"));
    }

    #[test]
    fn apostrophes_and_punctuation_are_literal() {
        let p = CompiledPattern::compile("can't cope", MatchMode::WordBoundary).unwrap();
        assert!(p.is_match("i can't cope, really"));
        assert!(!p.is_match("i cant cope"));

        let q = CompiledPattern::compile("(help)", MatchMode::WordBoundary).unwrap();
        assert!(q.is_match("see (help) here"));
    }

    #[test]
    fn mask_blanks_whole_occurrences_only() {
        let p = CompiledPattern::compile("try again", MatchMode::WordBoundary).unwrap();
        assert_eq!(p.mask("i'll try again. try again!"), "i'll          .          !");
        assert_eq!(p.mask("retry againward"), "retry againward");

        let s = CompiledPattern::compile("again", MatchMode::Substring).unwrap();
        assert_eq!(s.mask("againx"), "     x");
    }

    #[test]
    fn compile_keeps_tier_order() {
        let corpus = PatternCorpus::embedded().unwrap();
        let c = CompiledCorpus::compile(&corpus, MatchMode::WordBoundary).unwrap();
        let order: Vec<Tier> = c.tiers.iter().map(|t| t.tier).collect();
        assert_eq!(order, Tier::ALL.to_vec());
    }
}
