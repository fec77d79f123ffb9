// src/corpus.rs
//! Pattern corpus: severity tiers and protective-factor categories.
//!
//! The corpus is a versioned TOML document loaded once at startup and never
//! mutated afterwards. Tiers are a closed enum so a typo like `"imediate"` is a
//! parse error instead of a silently ignored tier.
//!
//! ```toml
//! version = "2025.1"
//!
//! [[tiers]]
//! tier = "immediate"
//! weight = 10.0
//! keywords = ["suicide"]
//! phrases = ["i want to kill myself"]
//! contextual_flags = ["have a plan"]
//!
//! [[protective]]
//! name = "copingMentions"
//! weight = -2.0
//! keywords = ["reached out"]
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CORPUS_PATH: &str = "config/corpus.toml";
pub const ENV_CORPUS_PATH: &str = "CRISIS_CORPUS_PATH";

/// Built-in corpus used when no file is found on disk.
const EMBEDDED_CORPUS: &str = include_str!("../config/corpus.toml");

/// Severity tier of a pattern set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Immediate,
    Escalating,
    Concerning,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Immediate, Tier::Escalating, Tier::Concerning];

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Immediate => "immediate",
            Tier::Escalating => "escalating",
            Tier::Concerning => "concerning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternSet {
    pub tier: Tier,
    pub weight: f32,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub phrases: Vec<String>,
    #[serde(default)]
    pub contextual_flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtectiveFactorCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub weight: f32,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternCorpus {
    pub version: String,
    pub tiers: Vec<PatternSet>,
    #[serde(default)]
    pub protective: Vec<ProtectiveFactorCategory>,
}

/// Schema violations found while validating a corpus.
#[derive(Debug, Error, PartialEq)]
pub enum CorpusError {
    #[error("corpus parse error: {0}")]
    Parse(String),
    #[error("corpus version must not be empty")]
    MissingVersion,
    #[error("tier `{0}` is defined more than once")]
    DuplicateTier(&'static str),
    #[error("tier `{tier}` weight must be a positive finite number, got {weight}")]
    InvalidTierWeight { tier: &'static str, weight: f32 },
    #[error("the immediate tier must define at least one keyword or phrase")]
    EmptyImmediateTier,
    #[error("tier `{tier}` contains a blank pattern")]
    BlankPattern { tier: &'static str },
    #[error("protective category `{0}` is defined more than once")]
    DuplicateCategory(String),
    #[error("protective category `{name}` weight must be negative and finite, got {weight}")]
    InvalidProtectiveWeight { name: String, weight: f32 },
    #[error("protective category `{0}` has no keywords")]
    EmptyCategory(String),
}

impl PatternCorpus {
    /// Load using `CRISIS_CORPUS_PATH`, then `config/corpus.toml`, then the embedded copy.
    /// A file that exists but fails validation is an error: a corrupted corpus
    /// must stop startup rather than misclassify crisis content.
    pub fn load() -> anyhow::Result<Self> {
        let explicit = std::env::var(ENV_CORPUS_PATH).ok().map(PathBuf::from);
        if let Some(path) = explicit {
            return Self::load_from(&path);
        }
        let default = PathBuf::from(DEFAULT_CORPUS_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        tracing::info!(target: "corpus", "no corpus file on disk, using embedded corpus");
        Ok(Self::embedded()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pattern corpus from {}", path.display()))?;
        let corpus = Self::from_toml_str(&content)
            .with_context(|| format!("invalid pattern corpus at {}", path.display()))?;
        tracing::info!(
            target: "corpus",
            version = %corpus.version,
            path = %path.display(),
            "pattern corpus loaded"
        );
        Ok(corpus)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, CorpusError> {
        let mut corpus: PatternCorpus =
            toml::from_str(s).map_err(|e| CorpusError::Parse(e.to_string()))?;
        corpus.normalize();
        corpus.validate()?;
        Ok(corpus)
    }

    /// The corpus compiled into the binary.
    pub fn embedded() -> Result<Self, CorpusError> {
        Self::from_toml_str(EMBEDDED_CORPUS)
    }

    pub fn tier(&self, tier: Tier) -> Option<&PatternSet> {
        self.tiers.iter().find(|t| t.tier == tier)
    }

    /// Lowercase and collapse whitespace in every pattern so matching only
    /// has to normalize the input side.
    fn normalize(&mut self) {
        for t in &mut self.tiers {
            for list in [&mut t.keywords, &mut t.phrases, &mut t.contextual_flags] {
                for p in list.iter_mut() {
                    *p = normalize_text(p);
                }
            }
        }
        for c in &mut self.protective {
            for k in c.keywords.iter_mut() {
                *k = normalize_text(k);
            }
        }
    }

    pub fn validate(&self) -> Result<(), CorpusError> {
        if self.version.trim().is_empty() {
            return Err(CorpusError::MissingVersion);
        }

        let mut seen = HashSet::new();
        for t in &self.tiers {
            let name = t.tier.as_str();
            if !seen.insert(t.tier) {
                return Err(CorpusError::DuplicateTier(name));
            }
            if !t.weight.is_finite() || t.weight <= 0.0 {
                return Err(CorpusError::InvalidTierWeight {
                    tier: name,
                    weight: t.weight,
                });
            }
            let blank = t
                .keywords
                .iter()
                .chain(&t.phrases)
                .chain(&t.contextual_flags)
                .any(|p| p.is_empty());
            if blank {
                return Err(CorpusError::BlankPattern { tier: name });
            }
        }

        // Without immediate patterns the hard-trigger override could never fire.
        match self.tier(Tier::Immediate) {
            Some(t) if !(t.keywords.is_empty() && t.phrases.is_empty()) => {}
            _ => return Err(CorpusError::EmptyImmediateTier),
        }

        let mut names = HashSet::new();
        for c in &self.protective {
            if !names.insert(c.name.as_str()) {
                return Err(CorpusError::DuplicateCategory(c.name.clone()));
            }
            if !c.weight.is_finite() || c.weight >= 0.0 {
                return Err(CorpusError::InvalidProtectiveWeight {
                    name: c.name.clone(),
                    weight: c.weight,
                });
            }
            if c.keywords.is_empty() || c.keywords.iter().any(|k| k.is_empty()) {
                return Err(CorpusError::EmptyCategory(c.name.clone()));
            }
        }
        Ok(())
    }
}

/// Lowercase, fold typographic apostrophes/quotes, collapse whitespace.
pub fn normalize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        let ch = match ch {
            '\u{2018}' | '\u{2019}' | '\u{02BC}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            c => c,
        };
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.extend(ch.to_lowercase());
            last_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
version = "test-1"

[[tiers]]
tier = "immediate"
weight = 10.0
keywords = ["  Kill   Myself "]
phrases = []

[[tiers]]
tier = "concerning"
weight = 1.0

[[protective]]
name = "copingMentions"
weight = -2.0
keywords = ["Reached Out"]
"#;

    #[test]
    fn embedded_corpus_is_valid() {
        let c = PatternCorpus::embedded().expect("embedded corpus must validate");
        assert!(!c.version.is_empty());
        for t in Tier::ALL {
            assert!(c.tier(t).is_some(), "missing tier {}", t.as_str());
        }
        let names: Vec<_> = c.protective.iter().map(|p| p.name.as_str()).collect();
        for expected in [
            "copingMentions",
            "futurePlanning",
            "problemSolving",
            "temporaryLanguage",
            "selfCareActions",
        ] {
            assert!(names.contains(&expected), "missing category {expected}");
        }
    }

    #[test]
    fn patterns_are_normalized_on_load() {
        let c = PatternCorpus::from_toml_str(MINIMAL).unwrap();
        assert_eq!(c.tier(Tier::Immediate).unwrap().keywords, vec!["kill myself"]);
        assert_eq!(c.protective[0].keywords, vec!["reached out"]);
        // empty tier lists are allowed
        assert!(c.tier(Tier::Concerning).unwrap().keywords.is_empty());
    }

    #[test]
    fn unknown_tier_is_a_parse_error() {
        let bad = MINIMAL.replace("tier = \"concerning\"", "tier = \"concernign\"");
        assert!(matches!(
            PatternCorpus::from_toml_str(&bad),
            Err(CorpusError::Parse(_))
        ));
    }

    #[test]
    fn positive_protective_weight_rejected() {
        let bad = MINIMAL.replace("weight = -2.0", "weight = 2.0");
        assert!(matches!(
            PatternCorpus::from_toml_str(&bad),
            Err(CorpusError::InvalidProtectiveWeight { .. })
        ));
    }

    #[test]
    fn duplicate_tier_rejected() {
        let bad = format!("{MINIMAL}\n[[tiers]]\ntier = \"immediate\"\nweight = 3.0\nkeywords = [\"x\"]\n");
        assert_eq!(
            PatternCorpus::from_toml_str(&bad),
            Err(CorpusError::DuplicateTier("immediate"))
        );
    }

    #[test]
    fn missing_immediate_patterns_rejected() {
        let bad = MINIMAL.replace(r#"keywords = ["  Kill   Myself "]"#, "keywords = []");
        assert_eq!(
            PatternCorpus::from_toml_str(&bad),
            Err(CorpusError::EmptyImmediateTier)
        );
    }

    #[test]
    fn blank_pattern_rejected() {
        let bad = MINIMAL.replace("phrases = []", r#"phrases = ["   "]"#);
        assert_eq!(
            PatternCorpus::from_toml_str(&bad),
            Err(CorpusError::BlankPattern { tier: "immediate" })
        );
    }

    #[test]
    fn unknown_field_rejected() {
        let bad = MINIMAL.replace("weight = 1.0", "weight = 1.0\nkeywrods = [\"sad\"]");
        assert!(matches!(
            PatternCorpus::from_toml_str(&bad),
            Err(CorpusError::Parse(_))
        ));
    }

    #[test]
    fn normalize_folds_case_quotes_and_whitespace() {
        assert_eq!(normalize_text("  I CAN\u{2019}T\t\tcope  "), "i can't cope");
    }
}
