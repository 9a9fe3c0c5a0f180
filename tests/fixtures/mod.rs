//! Test fixtures and mock implementations for integration testing

#![allow(dead_code)]

use alliance_skill::config::RatingConfig;
use alliance_skill::error::Result;
use alliance_skill::match_log::{MatchSource, RawEntry, RawMatch, StaticMatchSource};
use alliance_skill::rating::TrueSkillRatingCalculator;
use alliance_skill::service::PredictionService;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Match source that blocks inside `load` until the test releases it
///
/// Lets a test hold a rebuild in flight while it exercises the busy and
/// cancellation paths.
#[derive(Debug)]
pub struct GatedMatchSource {
    matches: Vec<RawMatch>,
    started: Notify,
    release: Notify,
    loads: AtomicUsize,
}

impl GatedMatchSource {
    pub fn new(matches: Vec<RawMatch>) -> Self {
        Self {
            matches,
            started: Notify::new(),
            release: Notify::new(),
            loads: AtomicUsize::new(0),
        }
    }

    /// Wait until a rebuild has entered `load`
    pub async fn wait_until_loading(&self) {
        self.started.notified().await;
    }

    /// Let one pending `load` return
    pub fn release(&self) {
        self.release.notify_one();
    }

    /// Number of times `load` has been entered
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MatchSource for GatedMatchSource {
    async fn load(&self) -> Result<Vec<RawEntry>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.release.notified().await;
        Ok(self.matches.iter().cloned().map(RawEntry::Match).collect())
    }

    fn describe(&self) -> String {
        format!("gated source ({} matches)", self.matches.len())
    }
}

/// Calculator with the default constants
pub fn default_calculator() -> Arc<TrueSkillRatingCalculator> {
    Arc::new(TrueSkillRatingCalculator::new(RatingConfig::default()).unwrap())
}

/// Prediction service over an in-memory list of matches
pub fn static_service(matches: Vec<RawMatch>) -> PredictionService {
    PredictionService::new(
        Arc::new(StaticMatchSource::new(matches)),
        default_calculator(),
    )
}

/// Prediction service over a gated source, returning the gate as well
pub fn gated_service(matches: Vec<RawMatch>) -> (PredictionService, Arc<GatedMatchSource>) {
    let source = Arc::new(GatedMatchSource::new(matches));
    let service = PredictionService::new(source.clone(), default_calculator());
    (service, source)
}

/// A short season among eight teams, three per alliance
pub fn season() -> Vec<RawMatch> {
    vec![
        RawMatch::new(&["254", "1678", "118"], &["971", "2056", "148"], 120, 98),
        RawMatch::new(&["254", "971", "33"], &["1678", "2056", "118"], 101, 110),
        RawMatch::new(&["148", "33", "118"], &["254", "1678", "971"], 76, 133),
        RawMatch::new(&["2056", "254", "33"], &["148", "118", "971"], 140, 87),
        RawMatch::new(&["1678", "148", "33"], &["2056", "971", "118"], 95, 95),
        RawMatch::new(&["971", "118", "254"], &["33", "2056", "1678"], 88, 104),
        RawMatch::new(&["2056", "1678", "254"], &["148", "33", "118"], 150, 60),
        RawMatch::new(&["971", "148", "1678"], &["254", "118", "2056"], 90, 112),
    ]
}

/// Write a temporary JSON match log and return its path
pub fn write_match_file(contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("alliance-skill-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, contents).unwrap();
    path
}
