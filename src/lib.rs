//! Alliance Skill - rating and win-probability engine for alliance matches
//!
//! This crate replays a chronological log of red-versus-blue alliance
//! matches through a TrueSkill update, publishes immutable rating snapshots,
//! and answers win-probability and accuracy queries against them.

pub mod config;
pub mod error;
pub mod match_log;
pub mod metrics;
pub mod rating;
pub mod service;
pub mod types;

// Re-export commonly used types and traits
pub use error::{EngineError, Result};
pub use types::*;

// Re-export key components
pub use match_log::{JsonFileMatchSource, MatchLog, MatchSource, StaticMatchSource};
pub use rating::{AccuracyReport, AlliancePredictor, RatingEngine, SkillSnapshot};
pub use service::PredictionService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
