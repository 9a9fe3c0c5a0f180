//! Rating store and published snapshots
//!
//! A [`RatingStore`] is the private, mutable staging area a rebuild writes
//! into. Once a rebuild completes the store is frozen into a
//! [`SkillSnapshot`], which readers share behind an `Arc` and never mutate.

use crate::error::Result;
use crate::match_log::MatchRecord;
use crate::rating::calculator::RatingCalculator;
use crate::types::{MatchOutcome, Side, TeamId, TeamRating};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// Rating of one team together with its participation count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingEntry {
    pub team_id: TeamId,
    pub rating: TeamRating,
    pub matches_played: u64,
}

impl RatingEntry {
    /// Create a new entry for a team seen for the first time
    pub fn new(team_id: TeamId, initial_rating: TeamRating) -> Self {
        Self {
            team_id,
            rating: initial_rating,
            matches_played: 0,
        }
    }

    /// Update the rating and count the participation
    pub fn update_rating(&mut self, new_rating: TeamRating) {
        self.rating = new_rating;
        self.matches_played += 1;
    }
}

/// Rating change for one team in one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingChange {
    pub team_id: TeamId,
    pub side: Side,
    pub old_rating: TeamRating,
    pub new_rating: TeamRating,
}

/// Everything one match did to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchUpdate {
    pub position: usize,
    pub outcome: MatchOutcome,
    /// Probability in `[0, 1]` the pre-match ratings gave the red side
    pub predicted_red_win: f64,
    pub changes: Vec<RatingChange>,
}

/// Mutable staging store owned by a single rebuild
#[derive(Debug, Default)]
pub struct RatingStore {
    entries: HashMap<TeamId, RatingEntry>,
}

impl RatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, team_id: &str) -> Option<&RatingEntry> {
        self.entries.get(team_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current rating of a team, initialising it with `prior` if unseen
    fn rating_or_insert(&mut self, team_id: &TeamId, prior: TeamRating) -> TeamRating {
        self.entries
            .entry(team_id.clone())
            .or_insert_with(|| RatingEntry::new(team_id.clone(), prior))
            .rating
    }

    /// Apply one validated match to the store
    pub fn apply(
        &mut self,
        record: &MatchRecord,
        calculator: &dyn RatingCalculator,
    ) -> Result<MatchUpdate> {
        let prior = calculator.initial_rating();

        let red_ids: Vec<&TeamId> = record.teams(Side::Red).collect();
        let blue_ids: Vec<&TeamId> = record.teams(Side::Blue).collect();

        let red: Vec<TeamRating> = red_ids
            .iter()
            .map(|id| self.rating_or_insert(id, prior))
            .collect();
        let blue: Vec<TeamRating> = blue_ids
            .iter()
            .map(|id| self.rating_or_insert(id, prior))
            .collect();

        let outcome = record.outcome();
        let result = calculator.calculate_rating_changes(&red, &blue, outcome)?;

        let mut changes = Vec::with_capacity(red_ids.len() + blue_ids.len());
        let sides = [
            (Side::Red, &red_ids, &red, &result.red),
            (Side::Blue, &blue_ids, &blue, &result.blue),
        ];
        for (side, ids, old, new) in sides {
            for ((id, old_rating), new_rating) in ids.iter().zip(old).zip(new) {
                if let Some(entry) = self.entries.get_mut(*id) {
                    entry.update_rating(*new_rating);
                }
                changes.push(RatingChange {
                    team_id: (*id).clone(),
                    side,
                    old_rating: *old_rating,
                    new_rating: *new_rating,
                });
            }
        }

        Ok(MatchUpdate {
            position: record.position(),
            outcome,
            predicted_red_win: result.predicted_red_win,
            changes,
        })
    }

    /// Freeze the store into an immutable snapshot
    pub fn into_snapshot(self, info: SnapshotInfo) -> SkillSnapshot {
        SkillSnapshot {
            info,
            ratings: self.entries,
        }
    }
}

/// Provenance of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// Increases by one with every publish; 0 is the initial empty snapshot
    pub generation: u64,
    pub rebuild_id: Option<Uuid>,
    pub built_at: DateTime<Utc>,
    pub matches_processed: usize,
    pub matches_rejected: usize,
}

/// Immutable, point-in-time copy of every team's rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSnapshot {
    info: SnapshotInfo,
    ratings: HashMap<TeamId, RatingEntry>,
}

impl SkillSnapshot {
    /// The snapshot published before any rebuild
    pub fn empty() -> Self {
        Self {
            info: SnapshotInfo {
                generation: 0,
                rebuild_id: None,
                built_at: Utc::now(),
                matches_processed: 0,
                matches_rejected: 0,
            },
            ratings: HashMap::new(),
        }
    }

    pub fn info(&self) -> &SnapshotInfo {
        &self.info
    }

    pub fn generation(&self) -> u64 {
        self.info.generation
    }

    pub fn get(&self, team_id: &str) -> Option<&RatingEntry> {
        self.ratings.get(team_id)
    }

    pub fn rating(&self, team_id: &str) -> Option<TeamRating> {
        self.get(team_id).map(|entry| entry.rating)
    }

    pub fn contains(&self, team_id: &str) -> bool {
        self.ratings.contains_key(team_id)
    }

    /// Every known team in identifier order
    pub fn teams(&self) -> BTreeSet<TeamId> {
        self.ratings.keys().cloned().collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &RatingEntry> + '_ {
        self.ratings.values()
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Teams ordered by mu, highest first; ties broken by identifier
    pub fn leaderboard(&self, limit: Option<usize>) -> Vec<RatingEntry> {
        let mut entries: Vec<RatingEntry> = self.ratings.values().cloned().collect();

        entries.sort_by(|a, b| {
            b.rating
                .mu
                .partial_cmp(&a.rating.mu)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.team_id.cmp(&b.team_id))
        });

        if let Some(limit) = limit {
            entries.truncate(limit);
        }

        entries
    }

    /// True when both snapshots rate the same teams within `tolerance`
    pub fn ratings_match(&self, other: &SkillSnapshot, tolerance: f64) -> bool {
        self.ratings.len() == other.ratings.len()
            && self.ratings.iter().all(|(team_id, entry)| {
                other.ratings.get(team_id).is_some_and(|theirs| {
                    (entry.rating.mu - theirs.rating.mu).abs() <= tolerance
                        && (entry.rating.sigma - theirs.rating.sigma).abs() <= tolerance
                        && entry.matches_played == theirs.matches_played
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_log::RawMatch;
    use crate::rating::calculator::MockRatingCalculator;

    fn record(position: usize, red: &[&str], blue: &[&str], rs: i64, bs: i64) -> MatchRecord {
        MatchRecord::from_raw(position, &RawMatch::new(red, blue, rs, bs)).unwrap()
    }

    fn info(generation: u64) -> SnapshotInfo {
        SnapshotInfo {
            generation,
            rebuild_id: Some(Uuid::new_v4()),
            built_at: Utc::now(),
            matches_processed: 0,
            matches_rejected: 0,
        }
    }

    #[test]
    fn test_rating_entry_update() {
        let mut entry = RatingEntry::new(
            TeamId::parse("1A").unwrap(),
            TeamRating::new(25.0, 8.0),
        );
        assert_eq!(entry.matches_played, 0);

        entry.update_rating(TeamRating::new(27.0, 7.0));
        assert_eq!(entry.rating.mu, 27.0);
        assert_eq!(entry.matches_played, 1);
    }

    #[test]
    fn test_apply_initialises_unseen_teams() {
        let calculator = MockRatingCalculator::new();
        let mut store = RatingStore::new();

        let update = store
            .apply(&record(0, &["1A", "2B"], &["3C"], 10, 4), &calculator)
            .unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(update.changes.len(), 3);
        assert_eq!(update.outcome, MatchOutcome::RedWin);
        assert_eq!(update.changes[2].side, Side::Blue);
        assert_eq!(store.get("1A").unwrap().matches_played, 1);
        assert_eq!(
            store.get("3C").unwrap().rating,
            calculator.initial_rating()
        );
    }

    #[test]
    fn test_apply_counts_participation() {
        let calculator = MockRatingCalculator::new();
        let mut store = RatingStore::new();

        store
            .apply(&record(0, &["1A"], &["2B"], 1, 0), &calculator)
            .unwrap();
        store
            .apply(&record(1, &["1A"], &["3C"], 1, 0), &calculator)
            .unwrap();

        assert_eq!(store.get("1A").unwrap().matches_played, 2);
        assert_eq!(store.get("2B").unwrap().matches_played, 1);
        assert!(store.get("4D").is_none());
    }

    #[test]
    fn test_snapshot_queries() {
        let calculator = MockRatingCalculator::new();
        let mut store = RatingStore::new();
        store
            .apply(&record(0, &["1A"], &["2B"], 1, 0), &calculator)
            .unwrap();

        let snapshot = store.into_snapshot(info(1));
        assert_eq!(snapshot.generation(), 1);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains("1A"));
        assert!(!snapshot.contains("1a"));
        let teams: Vec<String> = snapshot.teams().iter().map(|t| t.to_string()).collect();
        assert_eq!(teams, vec!["1A", "2B"]);
    }

    #[test]
    fn test_leaderboard_ordering() {
        let mut ratings = HashMap::new();
        for (id, mu) in [("1A", 20.0), ("2B", 30.0), ("3C", 25.0), ("0Z", 25.0)] {
            let team_id = TeamId::parse(id).unwrap();
            ratings.insert(
                team_id.clone(),
                RatingEntry::new(team_id, TeamRating::new(mu, 3.0)),
            );
        }
        let snapshot = SkillSnapshot {
            info: info(1),
            ratings,
        };

        let board: Vec<String> = snapshot
            .leaderboard(None)
            .iter()
            .map(|e| e.team_id.to_string())
            .collect();
        assert_eq!(board, vec!["2B", "0Z", "3C", "1A"]);
        assert_eq!(snapshot.leaderboard(Some(2)).len(), 2);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = SkillSnapshot::empty();
        assert_eq!(snapshot.generation(), 0);
        assert!(snapshot.is_empty());
        assert!(snapshot.get("UNKNOWN").is_none());
        assert!(snapshot.ratings_match(&SkillSnapshot::empty(), 0.0));
    }
}
