//! Side distributions and win probability
//!
//! A side's performance is modelled as the sum of independent normal team
//! performances, each with the team's skill variance plus a shared
//! per-performance noise `beta²`.

use crate::types::TeamRating;
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;

/// Joint performance distribution of one side of a match
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideDistribution {
    pub mu: f64,
    pub variance: f64,
    pub size: usize,
}

impl SideDistribution {
    /// Combine team ratings into a side distribution
    pub fn combine<'a, I>(ratings: I, beta: f64) -> Self
    where
        I: IntoIterator<Item = &'a TeamRating>,
    {
        let mut side = Self {
            mu: 0.0,
            variance: 0.0,
            size: 0,
        };

        for rating in ratings {
            side.mu += rating.mu;
            side.variance += rating.variance() + beta * beta;
            side.size += 1;
        }

        side
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// Standard normal cumulative distribution function
pub fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Probability in `[0, 1]` that side `a` outperforms side `b`
///
/// Negative skill differences are evaluated by mirroring, so
/// `win_probability(a, b) + win_probability(b, a)` is one up to a single
/// rounding step and equal sides give exactly one half.
pub fn win_probability(a: &SideDistribution, b: &SideDistribution) -> f64 {
    let delta = a.mu - b.mu;
    if delta == 0.0 {
        return 0.5;
    }
    if delta < 0.0 {
        return 1.0 - win_probability(b, a);
    }

    let spread = (a.variance + b.variance).sqrt();
    standard_normal_cdf(delta / spread)
}
