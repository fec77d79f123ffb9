// src/config/mod.rs
pub mod engine;

pub use engine::{
    AlertConfig, EngineConfig, HistoryConfig, LevelThresholds, MatchMode, MoodConfig,
    ProtectiveConfig, RealtimeConfig,
};
