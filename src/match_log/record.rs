//! Match records and their validation
//!
//! A [`RawMatch`] is what the ingestion boundary hands us: loosely typed,
//! possibly incomplete. [`MatchRecord::from_raw`] turns it into a validated,
//! immutable record or explains why it was rejected.

use crate::types::{MatchOutcome, Side, TeamId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed slot positions of a match, three per alliance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    Red1,
    Red2,
    Red3,
    Blue1,
    Blue2,
    Blue3,
}

impl Slot {
    /// All slots in storage order
    pub const ALL: [Slot; 6] = [
        Slot::Red1,
        Slot::Red2,
        Slot::Red3,
        Slot::Blue1,
        Slot::Blue2,
        Slot::Blue3,
    ];

    /// Number of slots on each side
    pub const PER_SIDE: usize = 3;

    /// The side this slot belongs to
    pub const fn side(self) -> Side {
        match self {
            Slot::Red1 | Slot::Red2 | Slot::Red3 => Side::Red,
            Slot::Blue1 | Slot::Blue2 | Slot::Blue3 => Side::Blue,
        }
    }

    const fn index(self) -> usize {
        match self {
            Slot::Red1 => 0,
            Slot::Red2 => 1,
            Slot::Red3 => 2,
            Slot::Blue1 => 3,
            Slot::Blue2 => 4,
            Slot::Blue3 => 5,
        }
    }
}

/// Match data as supplied by a [`MatchSource`](super::MatchSource)
///
/// Field names follow the JSON export format (`red1`..`blue3`, `redscore`,
/// `bluescore`). Scores are signed so that a negative value can be rejected
/// per record instead of failing the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMatch {
    #[serde(default)]
    pub red1: Option<String>,
    #[serde(default)]
    pub red2: Option<String>,
    #[serde(default)]
    pub red3: Option<String>,
    #[serde(default)]
    pub blue1: Option<String>,
    #[serde(default)]
    pub blue2: Option<String>,
    #[serde(default)]
    pub blue3: Option<String>,
    #[serde(default)]
    pub redscore: Option<i64>,
    #[serde(default)]
    pub bluescore: Option<i64>,
}

impl RawMatch {
    /// Convenience constructor for alliances given as plain string slices
    pub fn new(red: &[&str], blue: &[&str], red_score: i64, blue_score: i64) -> Self {
        let pick = |side: &[&str], i: usize| side.get(i).map(|s| s.to_string());
        Self {
            red1: pick(red, 0),
            red2: pick(red, 1),
            red3: pick(red, 2),
            blue1: pick(blue, 0),
            blue2: pick(blue, 1),
            blue3: pick(blue, 2),
            redscore: Some(red_score),
            bluescore: Some(blue_score),
        }
    }

    fn slot_value(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::Red1 => self.red1.as_deref(),
            Slot::Red2 => self.red2.as_deref(),
            Slot::Red3 => self.red3.as_deref(),
            Slot::Blue1 => self.blue1.as_deref(),
            Slot::Blue2 => self.blue2.as_deref(),
            Slot::Blue3 => self.blue3.as_deref(),
        }
    }
}

/// One entry produced by a match source
#[derive(Debug, Clone, PartialEq)]
pub enum RawEntry {
    /// A decoded match object
    Match(RawMatch),
    /// An entry that could not be decoded at all
    Malformed { detail: String },
}

impl From<RawMatch> for RawEntry {
    fn from(raw: RawMatch) -> Self {
        RawEntry::Match(raw)
    }
}

/// Why a record was excluded from processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidReason {
    MissingScore { side: Side },
    NegativeScore { side: Side },
    Malformed { detail: String },
    DuplicateTeam { side: Side, team_id: TeamId },
    EmptySide { side: Side },
    TeamOnBothSides { team_id: TeamId },
}

impl InvalidReason {
    /// Short label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            InvalidReason::MissingScore { .. } => "missing_score",
            InvalidReason::NegativeScore { .. } => "negative_score",
            InvalidReason::Malformed { .. } => "malformed",
            InvalidReason::DuplicateTeam { .. } => "duplicate_team",
            InvalidReason::EmptySide { .. } => "empty_side",
            InvalidReason::TeamOnBothSides { .. } => "team_on_both_sides",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::MissingScore { side } => write!(f, "missing {} score", side),
            InvalidReason::NegativeScore { side } => write!(f, "negative {} score", side),
            InvalidReason::Malformed { detail } => write!(f, "malformed entry: {}", detail),
            InvalidReason::DuplicateTeam { side, team_id } => {
                write!(f, "team {} appears twice on the {} side", team_id, side)
            }
            InvalidReason::EmptySide { side } => write!(f, "no teams on the {} side", side),
            InvalidReason::TeamOnBothSides { team_id } => {
                write!(f, "team {} appears on both sides", team_id)
            }
        }
    }
}

/// A validated, immutable match result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    position: usize,
    slots: [Option<TeamId>; 6],
    red_score: u32,
    blue_score: u32,
}

impl MatchRecord {
    /// Validate a raw match found at `position` in the source
    pub fn from_raw(position: usize, raw: &RawMatch) -> Result<Self, InvalidReason> {
        let red_score = validate_score(raw.redscore, Side::Red)?;
        let blue_score = validate_score(raw.bluescore, Side::Blue)?;

        let mut slots: [Option<TeamId>; 6] = Default::default();
        for slot in Slot::ALL {
            slots[slot.index()] = raw.slot_value(slot).and_then(TeamId::parse);
        }

        let record = Self {
            position,
            slots,
            red_score,
            blue_score,
        };

        for side in [Side::Red, Side::Blue] {
            let teams: Vec<&TeamId> = record.teams(side).collect();
            if teams.is_empty() {
                return Err(InvalidReason::EmptySide { side });
            }
            for (i, team) in teams.iter().enumerate() {
                if teams[..i].contains(team) {
                    return Err(InvalidReason::DuplicateTeam {
                        side,
                        team_id: (*team).clone(),
                    });
                }
            }
        }

        if let Some(shared) = record
            .teams(Side::Red)
            .find(|team| record.teams(Side::Blue).any(|other| other == *team))
        {
            return Err(InvalidReason::TeamOnBothSides {
                team_id: shared.clone(),
            });
        }

        Ok(record)
    }

    /// Position of the record in the source, which defines processing order
    pub fn position(&self) -> usize {
        self.position
    }

    /// Team occupying a slot, `None` for a bye
    pub fn slot(&self, slot: Slot) -> Option<&TeamId> {
        self.slots[slot.index()].as_ref()
    }

    /// Teams on one side in slot order, skipping byes
    pub fn teams(&self, side: Side) -> impl Iterator<Item = &TeamId> + '_ {
        Slot::ALL
            .into_iter()
            .filter(move |slot| slot.side() == side)
            .filter_map(move |slot| self.slot(slot))
    }

    /// Every participating team, red side first
    pub fn participants(&self) -> impl Iterator<Item = &TeamId> + '_ {
        self.slots.iter().flatten()
    }

    pub fn red_score(&self) -> u32 {
        self.red_score
    }

    pub fn blue_score(&self) -> u32 {
        self.blue_score
    }

    /// Actual outcome from the score comparison
    pub fn outcome(&self) -> MatchOutcome {
        MatchOutcome::from_scores(self.red_score, self.blue_score)
    }
}

fn validate_score(score: Option<i64>, side: Side) -> Result<u32, InvalidReason> {
    let score = score.ok_or(InvalidReason::MissingScore { side })?;
    if score < 0 {
        return Err(InvalidReason::NegativeScore { side });
    }
    u32::try_from(score).map_err(|_| InvalidReason::Malformed {
        detail: format!("{} score {} out of range", side, score),
    })
}
