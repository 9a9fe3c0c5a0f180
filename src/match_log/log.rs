//! The ordered, immutable match history

use crate::match_log::record::{InvalidReason, MatchRecord, RawEntry};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A record that failed validation, kept for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub position: usize,
    pub reason: InvalidReason,
}

/// Chronologically ordered sequence of validated match records
///
/// The log is immutable once built; [`MatchLog::iter`] can be called any
/// number of times and always yields the records in source order. It is
/// only built through [`MatchLog::ingest`], so every record it holds passed
/// validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchLog {
    records: Vec<MatchRecord>,
    rejected: Vec<RejectedRecord>,
}

impl MatchLog {
    /// Validate source entries in order, keeping the valid ones
    ///
    /// Invalid entries are logged and reported through [`MatchLog::rejected`];
    /// they never abort ingestion of the rest of the batch.
    pub fn ingest<I, E>(entries: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<RawEntry>,
    {
        let mut log = Self::default();

        for (position, entry) in entries.into_iter().enumerate() {
            let result = match entry.into() {
                RawEntry::Match(raw) => MatchRecord::from_raw(position, &raw),
                RawEntry::Malformed { detail } => Err(InvalidReason::Malformed { detail }),
            };

            match result {
                Ok(record) => log.records.push(record),
                Err(reason) => {
                    warn!("Skipping invalid match record at position {}: {}", position, reason);
                    log.rejected.push(RejectedRecord { position, reason });
                }
            }
        }

        debug!(
            "Ingested match log: {} valid, {} rejected",
            log.records.len(),
            log.rejected.len()
        );

        log
    }

    /// Valid records in processing order
    pub fn iter(&self) -> std::slice::Iter<'_, MatchRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[MatchRecord] {
        &self.records
    }

    /// Records excluded during ingestion
    pub fn rejected(&self) -> &[RejectedRecord] {
        &self.rejected
    }

    /// Number of valid records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when there is nothing to process
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a MatchLog {
    type Item = &'a MatchRecord;
    type IntoIter = std::slice::Iter<'a, MatchRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
