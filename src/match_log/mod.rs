//! Match history ingestion
//!
//! This module turns raw match results from a [`MatchSource`] into a
//! validated, chronologically ordered [`MatchLog`].

pub mod log;
pub mod record;
pub mod source;

// Re-export commonly used types
pub use log::{MatchLog, RejectedRecord};
pub use record::{InvalidReason, MatchRecord, RawEntry, RawMatch, Slot};
pub use source::{JsonFileMatchSource, MatchSource, StaticMatchSource};
