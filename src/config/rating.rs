//! Rating system configuration

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use skillratings::trueskill::TrueSkillConfig;

/// Parameters of the skill model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Prior skill for a team seen for the first time
    pub initial_mu: f64,
    /// Prior uncertainty for a team seen for the first time
    pub initial_sigma: f64,
    /// Per-performance noise shared by every team
    pub beta: f64,
    /// Floor below which a team's uncertainty never shrinks
    pub sigma_min: f64,
    /// Assumed share of drawn matches, sets the draw margin of the update
    pub draw_probability: f64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            initial_mu: 25.0,
            initial_sigma: 25.0 / 3.0,
            beta: 4.0,
            sigma_min: 0.5,
            draw_probability: 0.1,
        }
    }
}

impl RatingConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !self.initial_mu.is_finite() {
            return Err(config_error("Initial mu must be finite"));
        }

        if !(self.initial_sigma.is_finite() && self.initial_sigma > 0.0) {
            return Err(config_error("Initial sigma must be positive"));
        }

        if !(self.beta.is_finite() && self.beta > 0.0) {
            return Err(config_error("Beta must be positive"));
        }

        if !(self.sigma_min.is_finite() && self.sigma_min > 0.0) {
            return Err(config_error("Sigma floor must be positive"));
        }

        if self.sigma_min > self.initial_sigma {
            return Err(config_error("Sigma floor cannot exceed initial sigma"));
        }

        if !(self.draw_probability > 0.0 && self.draw_probability < 1.0) {
            return Err(config_error("Draw probability must be within (0, 1)"));
        }

        Ok(())
    }

    /// Settings for the TrueSkill factor graph, without a dynamics term so
    /// that uncertainty never grows between matches
    pub fn trueskill_config(&self) -> TrueSkillConfig {
        TrueSkillConfig {
            draw_probability: self.draw_probability,
            beta: self.beta,
            default_dynamics: 0.0,
        }
    }
}

fn config_error(message: &str) -> EngineError {
    EngineError::ConfigurationError {
        message: message.to_string(),
    }
}
