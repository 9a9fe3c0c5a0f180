//! Rating calculator trait and implementations
//!
//! This module defines the interface for per-match rating updates and a mock
//! implementation used to observe what the engine feeds the calculator.

use crate::error::{EngineError, Result};
use crate::rating::distribution::{win_probability, SideDistribution};
use crate::types::{MatchOutcome, TeamRating};
use serde::{Deserialize, Serialize};

/// Result of rating one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingCalculationResult {
    /// Updated ratings for the red side, in input order
    pub red: Vec<TeamRating>,
    /// Updated ratings for the blue side, in input order
    pub blue: Vec<TeamRating>,
    /// Probability in `[0, 1]` the pre-match ratings gave the red side
    pub predicted_red_win: f64,
}

/// Trait for calculating rating changes after a match
pub trait RatingCalculator: Send + Sync {
    /// Calculate updated ratings for both sides given the actual outcome
    ///
    /// # Arguments
    /// * `red` - Current ratings of the red side teams
    /// * `blue` - Current ratings of the blue side teams
    /// * `outcome` - Outcome from the score comparison
    fn calculate_rating_changes(
        &self,
        red: &[TeamRating],
        blue: &[TeamRating],
        outcome: MatchOutcome,
    ) -> Result<RatingCalculationResult>;

    /// Get the prior rating for a team seen for the first time
    fn initial_rating(&self) -> TeamRating;

    /// Per-performance noise used when combining teams into a side
    fn beta(&self) -> f64;

    /// Get current configuration as JSON
    fn config(&self) -> serde_json::Value;

    /// Probability in `[0, 1]` that `red` outperforms `blue`
    fn predict(&self, red: &[TeamRating], blue: &[TeamRating]) -> f64 {
        let beta = self.beta();
        win_probability(
            &SideDistribution::combine(red, beta),
            &SideDistribution::combine(blue, beta),
        )
    }
}

/// Reject matches with an empty side before they reach a calculator
pub(crate) fn ensure_sides(red: &[TeamRating], blue: &[TeamRating]) -> Result<()> {
    if red.is_empty() || blue.is_empty() {
        return Err(EngineError::InternalError {
            message: "Rating calculation requires teams on both sides".to_string(),
        });
    }
    Ok(())
}

/// Mock rating calculator for testing
///
/// Records every call and returns the ratings unchanged.
#[derive(Debug)]
pub struct MockRatingCalculator {
    calculation_calls: std::sync::Mutex<Vec<(Vec<TeamRating>, Vec<TeamRating>, MatchOutcome)>>,
    initial_rating: TeamRating,
    beta: f64,
}

impl MockRatingCalculator {
    pub fn new() -> Self {
        Self {
            calculation_calls: std::sync::Mutex::new(Vec::new()),
            initial_rating: TeamRating::new(25.0, 25.0 / 3.0),
            beta: 4.0,
        }
    }

    /// Get all calculation calls made (for testing)
    pub fn get_calculation_calls(&self) -> Vec<(Vec<TeamRating>, Vec<TeamRating>, MatchOutcome)> {
        self.calculation_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Clear recorded calls
    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calculation_calls.lock() {
            calls.clear();
        }
    }
}

impl Default for MockRatingCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl RatingCalculator for MockRatingCalculator {
    fn calculate_rating_changes(
        &self,
        red: &[TeamRating],
        blue: &[TeamRating],
        outcome: MatchOutcome,
    ) -> Result<RatingCalculationResult> {
        ensure_sides(red, blue)?;

        if let Ok(mut calls) = self.calculation_calls.lock() {
            calls.push((red.to_vec(), blue.to_vec(), outcome));
        }

        Ok(RatingCalculationResult {
            red: red.to_vec(),
            blue: blue.to_vec(),
            predicted_red_win: self.predict(red, blue),
        })
    }

    fn initial_rating(&self) -> TeamRating {
        self.initial_rating
    }

    fn beta(&self) -> f64 {
        self.beta
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "mock",
            "initial_mu": self.initial_rating.mu,
            "initial_sigma": self.initial_rating.sigma,
            "beta": self.beta
        })
    }
}
