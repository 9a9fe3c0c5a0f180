//! Self-consistency accuracy of a snapshot
//!
//! The evaluator replays the log against the final snapshot, which has
//! already been trained on every match it is asked about. The figure it
//! reports is therefore a measure of how well the ratings explain the
//! history, not of how well they predict unseen matches.

use crate::error::{EngineError, Result};
use crate::match_log::MatchLog;
use crate::rating::predictor::AlliancePredictor;
use crate::types::{MatchOutcome, Side, TeamId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Correct and total predictions over one replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyReport {
    pub correct: usize,
    pub total: usize,
}

impl AccuracyReport {
    /// Fraction of matches predicted correctly, in `[0, 1]`
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total as f64
    }

    pub fn percentage(&self) -> f64 {
        self.accuracy() * 100.0
    }
}

impl std::fmt::Display for AccuracyReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} correct ({:.2}%)",
            self.correct,
            self.total,
            self.percentage()
        )
    }
}

pub struct AccuracyEvaluator {
    predictor: AlliancePredictor,
}

impl AccuracyEvaluator {
    pub fn new(predictor: AlliancePredictor) -> Self {
        Self { predictor }
    }

    /// Replay every valid record and count correct predictions
    ///
    /// A prediction of exactly 50 is a draw prediction and only counts as
    /// correct when the scores were equal.
    pub fn evaluate(&self, log: &MatchLog) -> Result<AccuracyReport> {
        if log.is_empty() {
            return Err(EngineError::EmptyLog);
        }

        let mut report = AccuracyReport {
            correct: 0,
            total: 0,
        };

        for record in log {
            let red: Vec<&TeamId> = record.teams(Side::Red).collect();
            let blue: Vec<&TeamId> = record.teams(Side::Blue).collect();

            let percentage = self.predictor.win_probability(&red, &blue)?;
            let predicted = MatchOutcome::predicted(percentage);
            let actual = record.outcome();

            report.total += 1;
            if predicted == actual {
                report.correct += 1;
            } else {
                debug!(
                    "Match {} mispredicted: {} expected at {:.2}%, actual {}",
                    record.position(),
                    predicted,
                    percentage,
                    actual
                );
            }
        }

        info!(
            "Accuracy against generation {}: {}",
            self.predictor.snapshot().generation(),
            report
        );

        Ok(report)
    }
}
