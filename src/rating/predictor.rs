//! Win probability queries against a published snapshot

use crate::error::{EngineError, Result};
use crate::rating::distribution::{win_probability, SideDistribution};
use crate::rating::storage::{RatingEntry, SkillSnapshot};
use crate::types::{TeamId, TeamRating};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Read-only predictor bound to one snapshot
///
/// Every query on the same predictor sees the same ratings, even if the
/// engine publishes a newer snapshot in the meantime.
#[derive(Debug, Clone)]
pub struct AlliancePredictor {
    snapshot: Arc<SkillSnapshot>,
    beta: f64,
}

impl AlliancePredictor {
    pub fn new(snapshot: Arc<SkillSnapshot>, beta: f64) -> Self {
        Self { snapshot, beta }
    }

    pub fn snapshot(&self) -> &Arc<SkillSnapshot> {
        &self.snapshot
    }

    /// Current rating of a single team
    pub fn team_detail(&self, team_id: &str) -> Result<TeamRating> {
        let id = Self::normalize(team_id)?;
        self.snapshot
            .rating(id.as_str())
            .ok_or_else(|| EngineError::UnknownTeam {
                team_id: id.to_string(),
            })
    }

    /// Combined performance distribution of a queried side
    ///
    /// Identifiers are normalised and de-duplicated. Blank identifiers are
    /// ignored. Unknown teams are reported in query order, while ratings are
    /// summed in identifier order so any ordering of a side combines to the
    /// same distribution.
    pub fn side_distribution<S: AsRef<str>>(&self, side: &[S]) -> Result<SideDistribution> {
        let mut ratings = BTreeMap::new();

        for raw in side {
            let Some(id) = TeamId::parse(raw.as_ref()) else {
                continue;
            };
            if ratings.contains_key(&id) {
                continue;
            }
            let rating = self
                .snapshot
                .rating(id.as_str())
                .ok_or_else(|| EngineError::UnknownTeam {
                    team_id: id.to_string(),
                })?;
            ratings.insert(id, rating);
        }

        if ratings.is_empty() {
            return Err(EngineError::InvalidQuery {
                reason: "each side needs at least one team".to_string(),
            });
        }

        Ok(SideDistribution::combine(ratings.values(), self.beta))
    }

    /// Percentage in `[0, 100]` that `side_a` beats `side_b`
    ///
    /// Swapping the sides yields the complement, and a side against itself
    /// is exactly 50.
    pub fn win_probability<S: AsRef<str>>(&self, side_a: &[S], side_b: &[S]) -> Result<f64> {
        let a = self.side_distribution(side_a)?;
        let b = self.side_distribution(side_b)?;

        let percentage = if a.mu < b.mu {
            100.0 - win_probability(&b, &a) * 100.0
        } else {
            win_probability(&a, &b) * 100.0
        };

        debug!(
            "Win probability for side of {} vs side of {} (generation {}): {:.2}%",
            a.size,
            b.size,
            self.snapshot.generation(),
            percentage
        );

        Ok(percentage)
    }

    /// Every team the snapshot knows, in identifier order
    pub fn known_teams(&self) -> BTreeSet<TeamId> {
        self.snapshot.teams()
    }

    /// Teams ordered by mu, highest first
    pub fn leaderboard(&self, limit: Option<usize>) -> Vec<RatingEntry> {
        self.snapshot.leaderboard(limit)
    }

    fn normalize(team_id: &str) -> Result<TeamId> {
        TeamId::parse(team_id).ok_or_else(|| EngineError::InvalidQuery {
            reason: "team identifier is blank".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RatingConfig;
    use crate::match_log::{MatchLog, RawMatch};
    use crate::rating::engine::RatingEngine;
    use crate::rating::trueskill::TrueSkillRatingCalculator;

    fn predictor() -> AlliancePredictor {
        let calculator = TrueSkillRatingCalculator::new(RatingConfig::default()).unwrap();
        let engine = RatingEngine::new(Arc::new(calculator));
        engine
            .rebuild(&MatchLog::ingest(vec![
                RawMatch::new(&["1A", "2B"], &["3C", "4D"], 30, 10),
                RawMatch::new(&["1A", "3C"], &["2B", "4D"], 25, 12),
                RawMatch::new(&["1A", "4D"], &["2B", "3C"], 18, 18),
            ]))
            .unwrap();
        engine.predictor()
    }

    #[test]
    fn test_team_detail() {
        let predictor = predictor();
        let rating = predictor.team_detail(" 1a ").unwrap();
        assert!(rating.mu > 25.0);

        assert_eq!(
            predictor.team_detail("UNKNOWN"),
            Err(EngineError::UnknownTeam {
                team_id: "UNKNOWN".to_string()
            })
        );
        assert!(matches!(
            predictor.team_detail("   "),
            Err(EngineError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_stronger_side_favoured() {
        let predictor = predictor();
        let p = predictor.win_probability(&["1A"], &["4D"]).unwrap();
        assert!(p > 50.0 && p <= 100.0);
    }

    #[test]
    fn test_symmetry() {
        let predictor = predictor();
        let ab = predictor.win_probability(&["1A", "2B"], &["3C"]).unwrap();
        let ba = predictor.win_probability(&["3C"], &["1A", "2B"]).unwrap();
        assert!((ab + ba - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_self_tie_is_exactly_half() {
        let predictor = predictor();
        assert_eq!(predictor.win_probability(&["1A", "3C"], &["3C", "1A"]).unwrap(), 50.0);
    }

    #[test]
    fn test_side_order_does_not_change_distribution() {
        let predictor = predictor();
        let forward = predictor.side_distribution(&["1A", "2B", "3C"]).unwrap();
        let reversed = predictor.side_distribution(&["3C", "2B", "1A"]).unwrap();
        let shuffled = predictor.side_distribution(&["2b", "3C", "1A"]).unwrap();

        assert_eq!(forward, reversed);
        assert_eq!(forward, shuffled);
        assert_eq!(
            predictor
                .win_probability(&["1A", "2B", "3C"], &["3C", "2B", "1A"])
                .unwrap(),
            50.0
        );
    }

    #[test]
    fn test_duplicates_and_case_collapse() {
        let predictor = predictor();
        let once = predictor.win_probability(&["1A"], &["2B"]).unwrap();
        let repeated = predictor
            .win_probability(&["1A", "1a", " 1A"], &["2b"])
            .unwrap();
        assert_eq!(once, repeated);
    }

    #[test]
    fn test_query_errors() {
        let predictor = predictor();
        let empty: [&str; 0] = [];

        assert!(matches!(
            predictor.win_probability(&empty, &["1A"]),
            Err(EngineError::InvalidQuery { .. })
        ));
        assert!(matches!(
            predictor.win_probability(&["  "], &["1A"]),
            Err(EngineError::InvalidQuery { .. })
        ));
        assert_eq!(
            predictor.win_probability(&["1A"], &["9Z"]),
            Err(EngineError::UnknownTeam {
                team_id: "9Z".to_string()
            })
        );
    }

    #[test]
    fn test_known_teams_and_leaderboard() {
        let predictor = predictor();
        assert_eq!(predictor.known_teams().len(), 4);

        let board = predictor.leaderboard(Some(1));
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].team_id.as_str(), "1A");
    }
}
