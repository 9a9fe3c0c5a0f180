//! Rating system built on the two-team TrueSkill update
//!
//! This module provides the per-match calculator, the staging store and
//! published snapshots, the rebuild engine, and the read-only predictor and
//! accuracy evaluator that query a snapshot.

pub mod accuracy;
pub mod calculator;
pub mod distribution;
pub mod engine;
pub mod predictor;
pub mod storage;
pub mod trueskill;

// Re-export commonly used types
pub use accuracy::{AccuracyEvaluator, AccuracyReport};
pub use calculator::{MockRatingCalculator, RatingCalculationResult, RatingCalculator};
pub use distribution::{win_probability, SideDistribution};
pub use engine::{RatingEngine, RebuildPermit};
pub use predictor::AlliancePredictor;
pub use storage::{
    MatchUpdate, RatingChange, RatingEntry, RatingStore, SkillSnapshot, SnapshotInfo,
};
pub use trueskill::TrueSkillRatingCalculator;
