//! Common types used throughout the rating engine

use serde::{Deserialize, Serialize};
use skillratings::trueskill::TrueSkillRating;
use std::borrow::Borrow;
use std::fmt;

/// Case-normalized team identifier
///
/// Identifiers are trimmed and upper-cased so that `"1234a "` and `"1234A"`
/// name the same team.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(String);

impl TeamId {
    /// Normalize a raw identifier, returning `None` for blank input
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TeamId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TeamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Skill distribution for a team: estimated skill `mu` and its uncertainty `sigma`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamRating {
    pub mu: f64,
    pub sigma: f64,
}

impl TeamRating {
    pub fn new(mu: f64, sigma: f64) -> Self {
        Self { mu, sigma }
    }

    pub fn variance(&self) -> f64 {
        self.sigma * self.sigma
    }

    pub fn is_finite(&self) -> bool {
        self.mu.is_finite() && self.sigma.is_finite()
    }
}

impl From<TrueSkillRating> for TeamRating {
    fn from(rating: TrueSkillRating) -> Self {
        Self {
            mu: rating.rating,
            sigma: rating.uncertainty,
        }
    }
}

impl From<TeamRating> for TrueSkillRating {
    fn from(rating: TeamRating) -> Self {
        Self {
            rating: rating.mu,
            uncertainty: rating.sigma,
        }
    }
}

/// One of the two competing alliances in a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Side A, the red alliance
    Red,
    /// Side B, the blue alliance
    Blue,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Red => write!(f, "red"),
            Side::Blue => write!(f, "blue"),
        }
    }
}

/// Result of a match from the point of view of side A
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchOutcome {
    RedWin,
    BlueWin,
    Draw,
}

impl MatchOutcome {
    /// Derive the outcome by comparing the two side scores
    pub fn from_scores(red_score: u32, blue_score: u32) -> Self {
        match red_score.cmp(&blue_score) {
            std::cmp::Ordering::Greater => MatchOutcome::RedWin,
            std::cmp::Ordering::Less => MatchOutcome::BlueWin,
            std::cmp::Ordering::Equal => MatchOutcome::Draw,
        }
    }

    /// Outcome predicted from a side-A win percentage in `[0, 100]`
    pub fn predicted(win_percentage: f64) -> Self {
        if win_percentage > 50.0 {
            MatchOutcome::RedWin
        } else if win_percentage < 50.0 {
            MatchOutcome::BlueWin
        } else {
            MatchOutcome::Draw
        }
    }
}

impl fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchOutcome::RedWin => write!(f, "red win"),
            MatchOutcome::BlueWin => write!(f, "blue win"),
            MatchOutcome::Draw => write!(f, "draw"),
        }
    }
}
