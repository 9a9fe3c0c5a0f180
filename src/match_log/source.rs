//! Match source traits and implementations
//!
//! A match source is the ingestion boundary: it knows where match results
//! live and how they are encoded, and hands back raw entries in the exact
//! chronological order they occurred.

use crate::error::{EngineError, Result};
use crate::match_log::log::MatchLog;
use crate::match_log::record::{RawEntry, RawMatch};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Trait for loading the match history
#[async_trait]
pub trait MatchSource: Send + Sync {
    /// Load every entry in chronological order
    async fn load(&self) -> Result<Vec<RawEntry>>;

    /// Human readable description for logs
    fn describe(&self) -> String;

    /// Load and validate the full history into a [`MatchLog`]
    async fn load_log(&self) -> Result<MatchLog> {
        let entries = self.load().await?;
        Ok(MatchLog::ingest(entries))
    }
}

/// In-memory match source
#[derive(Debug, Clone, Default)]
pub struct StaticMatchSource {
    entries: Vec<RawEntry>,
}

impl StaticMatchSource {
    /// Create a source from decoded matches
    pub fn new(matches: Vec<RawMatch>) -> Self {
        Self {
            entries: matches.into_iter().map(RawEntry::Match).collect(),
        }
    }

    /// Create a source from arbitrary entries, malformed ones included
    pub fn from_entries(entries: Vec<RawEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl MatchSource for StaticMatchSource {
    async fn load(&self) -> Result<Vec<RawEntry>> {
        Ok(self.entries.clone())
    }

    fn describe(&self) -> String {
        format!("static source ({} entries)", self.entries.len())
    }
}

/// Match source backed by a JSON array on disk
///
/// Each array element is decoded on its own, so a single element with the
/// wrong shape is rejected without discarding the rest of the file.
#[derive(Debug, Clone)]
pub struct JsonFileMatchSource {
    path: PathBuf,
}

impl JsonFileMatchSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode a JSON document into raw entries
    pub fn parse(document: &str) -> Result<Vec<RawEntry>> {
        let value: serde_json::Value =
            serde_json::from_str(document).map_err(|e| EngineError::Source {
                message: format!("Invalid match log JSON: {}", e),
            })?;

        let items = match value {
            serde_json::Value::Array(items) => items,
            other => {
                return Err(EngineError::Source {
                    message: format!(
                        "Match log must be a JSON array, found {}",
                        json_kind(&other)
                    ),
                })
            }
        };

        Ok(items
            .into_iter()
            .map(|item| match serde_json::from_value::<RawMatch>(item) {
                Ok(raw) => RawEntry::Match(raw),
                Err(e) => RawEntry::Malformed {
                    detail: e.to_string(),
                },
            })
            .collect())
    }
}

#[async_trait]
impl MatchSource for JsonFileMatchSource {
    async fn load(&self) -> Result<Vec<RawEntry>> {
        info!("Loading match log from {}", self.path.display());

        let document = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| EngineError::Source {
                message: format!("Failed to read {}: {}", self.path.display(), e),
            })?;

        let entries = Self::parse(&document)?;
        debug!("Decoded {} entries from {}", entries.len(), self.path.display());
        Ok(entries)
    }

    fn describe(&self) -> String {
        format!("json file {}", self.path.display())
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
