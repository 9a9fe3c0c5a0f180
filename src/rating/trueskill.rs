//! TrueSkill rating system implementation
//!
//! This module provides the concrete rating calculator, built on the two-team
//! TrueSkill factor graph from the skillratings crate. The factor graph
//! update is moment matching: each team's mu moves toward the observed result
//! in proportion to its share of the match variance, and its sigma shrinks.
//! Results are then clamped so sigma never grows and never crosses the floor.

use crate::config::RatingConfig;
use crate::error::Result;
use crate::rating::calculator::{ensure_sides, RatingCalculationResult, RatingCalculator};
use crate::types::{MatchOutcome, TeamRating};
use skillratings::trueskill::{trueskill_two_teams, TrueSkillConfig, TrueSkillRating};
use skillratings::Outcomes;
use tracing::warn;

/// TrueSkill rating calculator implementation
#[derive(Debug)]
pub struct TrueSkillRatingCalculator {
    config: RatingConfig,
    trueskill: TrueSkillConfig,
}

impl TrueSkillRatingCalculator {
    /// Create a new TrueSkill rating calculator
    pub fn new(config: RatingConfig) -> Result<Self> {
        config.validate()?;
        let trueskill = config.trueskill_config();

        Ok(Self { config, trueskill })
    }

    pub fn rating_config(&self) -> &RatingConfig {
        &self.config
    }

    /// Clamp an updated rating so sigma is non-increasing and stays above the
    /// floor; a non-finite update leaves the rating untouched
    fn settle(&self, old: TeamRating, new: TeamRating) -> TeamRating {
        if !new.is_finite() {
            warn!(
                "Discarding non-finite rating update (mu={}, sigma={}), keeping mu={}, sigma={}",
                new.mu, new.sigma, old.mu, old.sigma
            );
            return old;
        }

        TeamRating {
            mu: new.mu,
            sigma: new.sigma.min(old.sigma).max(self.config.sigma_min),
        }
    }
}

impl RatingCalculator for TrueSkillRatingCalculator {
    fn calculate_rating_changes(
        &self,
        red: &[TeamRating],
        blue: &[TeamRating],
        outcome: MatchOutcome,
    ) -> Result<RatingCalculationResult> {
        ensure_sides(red, blue)?;

        let red_trueskill: Vec<TrueSkillRating> = red.iter().map(|r| (*r).into()).collect();
        let blue_trueskill: Vec<TrueSkillRating> = blue.iter().map(|r| (*r).into()).collect();

        let outcome_for_red = match outcome {
            MatchOutcome::RedWin => Outcomes::WIN,
            MatchOutcome::BlueWin => Outcomes::LOSS,
            MatchOutcome::Draw => Outcomes::DRAW,
        };

        let (new_red, new_blue) = trueskill_two_teams(
            &red_trueskill,
            &blue_trueskill,
            &outcome_for_red,
            &self.trueskill,
        );

        let red_updated = red
            .iter()
            .zip(new_red)
            .map(|(old, new)| self.settle(*old, new.into()))
            .collect();
        let blue_updated = blue
            .iter()
            .zip(new_blue)
            .map(|(old, new)| self.settle(*old, new.into()))
            .collect();

        Ok(RatingCalculationResult {
            red: red_updated,
            blue: blue_updated,
            predicted_red_win: self.predict(red, blue),
        })
    }

    fn initial_rating(&self) -> TeamRating {
        TeamRating::new(self.config.initial_mu, self.config.initial_sigma)
    }

    fn beta(&self) -> f64 {
        self.config.beta
    }

    fn config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }
}
