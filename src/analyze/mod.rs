// src/analyze/mod.rs
//! Analysis pipeline stages. Each stage is pure; orchestration and I/O live in
//! [`crate::engine`].
//!
//! matcher → content → fusion → classify, plus the standalone real-time scan.

pub mod classify;
pub mod content;
pub mod fusion;
pub mod matcher;
pub mod realtime;

pub use classify::{classify, Classification};
pub use content::{text_stats, ContentAnalysis, ContentAnalyzer};
pub use fusion::{fuse, protective_reduction, Fused};
pub use matcher::{normalize_text, CompiledCorpus, CompiledPattern};
pub use realtime::quick_analyze;
