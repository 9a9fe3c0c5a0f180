//! Error types for the rating engine
//!
//! Every failure the engine can report is a variant of [`EngineError`]. None of
//! them are fatal to the owning process: ingestion errors are per record and
//! query errors are per call.

use crate::match_log::InvalidReason;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, EngineError>;

/// Custom error types for rating and prediction scenarios
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid match record at position {position}: {reason}")]
    InvalidMatchRecord {
        position: usize,
        reason: InvalidReason,
    },

    #[error("Team not found: {team_id}")]
    UnknownTeam { team_id: String },

    #[error("A rebuild is already in progress")]
    RebuildBusy,

    #[error("Rebuild was cancelled before publishing")]
    RebuildCancelled,

    #[error("Match log contains no valid records")]
    EmptyLog,

    #[error("Invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("Match source failed: {message}")]
    Source { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal engine error: {message}")]
    InternalError { message: String },
}

impl EngineError {
    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidMatchRecord { .. } => "invalid_record",
            EngineError::UnknownTeam { .. } => "unknown_team",
            EngineError::RebuildBusy => "busy",
            EngineError::RebuildCancelled => "cancelled",
            EngineError::EmptyLog => "empty_log",
            EngineError::InvalidQuery { .. } => "invalid_query",
            EngineError::Source { .. } => "source",
            EngineError::ConfigurationError { .. } => "configuration",
            EngineError::InternalError { .. } => "internal",
        }
    }
}
