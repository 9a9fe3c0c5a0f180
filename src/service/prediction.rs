//! The prediction service: the public face of the rating engine
//!
//! `PredictionService` ties a [`MatchSource`] to a [`RatingEngine`]. It is a
//! cheap `Clone` handle; construct it once and pass it to whatever needs to
//! query ratings. The engine stays private so every published snapshot is
//! paired with the log that trained it.

use crate::error::{EngineError, Result};
use crate::match_log::{MatchLog, MatchSource};
use crate::metrics::MetricsCollector;
use crate::rating::{
    AccuracyEvaluator, AccuracyReport, AlliancePredictor, RatingCalculator, RatingEngine,
    RatingEntry, SkillSnapshot,
};
use crate::types::{TeamId, TeamRating};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Snapshot together with the log it was trained on
#[derive(Debug, Clone)]
struct TrainedState {
    snapshot: Arc<SkillSnapshot>,
    log: Arc<MatchLog>,
}

#[derive(Clone)]
pub struct PredictionService {
    source: Arc<dyn MatchSource>,
    engine: RatingEngine,
    metrics: Option<Arc<MetricsCollector>>,
    trained: Arc<RwLock<Option<TrainedState>>>,
}

impl PredictionService {
    /// Create a new prediction service
    pub fn new(source: Arc<dyn MatchSource>, calculator: Arc<dyn RatingCalculator>) -> Self {
        Self {
            source,
            engine: RatingEngine::new(calculator),
            metrics: None,
            trained: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a new prediction service that records metrics
    pub fn with_metrics(
        source: Arc<dyn MatchSource>,
        calculator: Arc<dyn RatingCalculator>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            source,
            engine: RatingEngine::with_metrics(calculator, metrics.clone()),
            metrics: Some(metrics),
            trained: Arc::new(RwLock::new(None)),
        }
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    /// The currently published snapshot
    pub fn snapshot(&self) -> Arc<SkillSnapshot> {
        self.engine.snapshot()
    }

    pub fn is_rebuilding(&self) -> bool {
        self.engine.is_rebuilding()
    }

    /// Reload the match history and recompute every rating
    ///
    /// Fails fast with [`EngineError::RebuildBusy`] if another rebuild holds
    /// the permit. The CPU-bound drain runs on the blocking pool.
    pub async fn rebuild(&self) -> Result<Arc<SkillSnapshot>> {
        let permit = self.engine.try_begin_rebuild()?;
        let rebuild_id = permit.rebuild_id();

        info!(
            "Rebuild {} loading matches from {}",
            rebuild_id,
            self.source.describe()
        );

        let log = match self.source.load_log().await {
            Ok(log) => Arc::new(log),
            Err(e) => {
                warn!("Rebuild {} could not load matches: {}", rebuild_id, e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_rebuild_failed(e.kind());
                }
                return Err(e);
            }
        };

        let staged = Arc::clone(&log);
        let snapshot = tokio::task::spawn_blocking(move || permit.run(&staged))
            .await
            .map_err(|e| EngineError::InternalError {
                message: format!("Rebuild task failed: {}", e),
            })??;

        let mut trained = self.trained.write().await;
        let newer = trained
            .as_ref()
            .map_or(true, |state| state.snapshot.generation() < snapshot.generation());
        if newer {
            *trained = Some(TrainedState {
                snapshot: Arc::clone(&snapshot),
                log,
            });
        }

        Ok(snapshot)
    }

    /// Request cooperative cancellation of the in-flight rebuild
    pub fn cancel_rebuild(&self) -> bool {
        self.engine.cancel_rebuild()
    }

    /// Current rating of one team
    pub fn team_detail(&self, team_id: &str) -> Result<TeamRating> {
        let result = self.engine.predictor().team_detail(team_id);
        self.observe("team_detail", result)
    }

    /// Percentage in `[0, 100]` that `side_a` beats `side_b`
    pub fn win_probability<S: AsRef<str>>(&self, side_a: &[S], side_b: &[S]) -> Result<f64> {
        let result = self.engine.predictor().win_probability(side_a, side_b);
        self.observe("win_probability", result)
    }

    /// Replay the log behind the published snapshot against that snapshot
    pub async fn evaluate_accuracy(&self) -> Result<AccuracyReport> {
        let state = self.trained.read().await.clone();
        let Some(TrainedState { snapshot, log }) = state else {
            debug!("Accuracy requested before any snapshot was trained");
            return self.observe("evaluate_accuracy", Err(EngineError::EmptyLog));
        };

        let predictor = AlliancePredictor::new(snapshot, self.engine.calculator().beta());
        let result = tokio::task::spawn_blocking(move || {
            AccuracyEvaluator::new(predictor).evaluate(&log)
        })
        .await
        .map_err(|e| EngineError::InternalError {
            message: format!("Accuracy task failed: {}", e),
        })
        .and_then(|report| report);

        if let (Ok(report), Some(metrics)) = (&result, &self.metrics) {
            metrics.record_accuracy(report.accuracy());
        }

        self.observe("evaluate_accuracy", result)
    }

    /// Every team the published snapshot knows
    pub fn list_known_teams(&self) -> BTreeSet<TeamId> {
        let teams = self.engine.predictor().known_teams();
        if let Some(metrics) = &self.metrics {
            metrics.record_query("list_known_teams", true);
        }
        teams
    }

    /// Teams ordered by mu, highest first
    pub fn leaderboard(&self, limit: Option<usize>) -> Vec<RatingEntry> {
        let board = self.engine.predictor().leaderboard(limit);
        if let Some(metrics) = &self.metrics {
            metrics.record_query("leaderboard", true);
        }
        board
    }

    fn observe<T>(&self, operation: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            debug!("{} failed: {}", operation, e);
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_query(operation, result.is_ok());
        }
        result
    }
}

impl std::fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionService")
            .field("source", &self.source.describe())
            .field("engine", &self.engine)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RatingConfig;
    use crate::match_log::{RawEntry, RawMatch, StaticMatchSource};
    use crate::rating::TrueSkillRatingCalculator;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Source whose history grows between loads
    struct GrowingSource {
        matches: Mutex<Vec<RawMatch>>,
    }

    #[async_trait]
    impl MatchSource for GrowingSource {
        async fn load(&self) -> Result<Vec<RawEntry>> {
            let matches = self.matches.lock().unwrap().clone();
            Ok(matches.into_iter().map(RawEntry::Match).collect())
        }

        fn describe(&self) -> String {
            "growing source".to_string()
        }
    }

    fn service(matches: Vec<RawMatch>) -> PredictionService {
        let calculator = TrueSkillRatingCalculator::new(RatingConfig::default()).unwrap();
        PredictionService::new(
            Arc::new(StaticMatchSource::new(matches)),
            Arc::new(calculator),
        )
    }

    #[tokio::test]
    async fn test_queries_before_rebuild() {
        let service = service(vec![RawMatch::new(&["1A"], &["2B"], 3, 1)]);

        assert_eq!(
            service.team_detail("UNKNOWN"),
            Err(EngineError::UnknownTeam {
                team_id: "UNKNOWN".to_string()
            })
        );
        assert_eq!(
            service.evaluate_accuracy().await,
            Err(EngineError::EmptyLog)
        );
        assert!(service.list_known_teams().is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_then_query() {
        let service = service(vec![
            RawMatch::new(&["1A", "2B"], &["3C", "4D"], 40, 12),
            RawMatch::new(&["1A", "3C"], &["2B", "4D"], 33, 20),
        ]);

        let snapshot = service.rebuild().await.unwrap();
        assert_eq!(snapshot.generation(), 1);
        assert_eq!(service.list_known_teams().len(), 4);

        let p = service.win_probability(&["1a"], &["4d"]).unwrap();
        assert!(p > 50.0);

        let report = service.evaluate_accuracy().await.unwrap();
        assert_eq!(report.total, 2);
        assert!((0.0..=1.0).contains(&report.accuracy()));
    }

    #[tokio::test]
    async fn test_accuracy_follows_each_published_snapshot() {
        let source = Arc::new(GrowingSource {
            matches: Mutex::new(vec![RawMatch::new(&["1A"], &["2B"], 3, 1)]),
        });
        let calculator = TrueSkillRatingCalculator::new(RatingConfig::default()).unwrap();
        let service = PredictionService::new(source.clone(), Arc::new(calculator));

        service.rebuild().await.unwrap();
        assert_eq!(service.evaluate_accuracy().await.unwrap().total, 1);

        source
            .matches
            .lock()
            .unwrap()
            .push(RawMatch::new(&["2B", "3C"], &["1A"], 9, 2));
        let snapshot = service.rebuild().await.unwrap();

        let report = service.evaluate_accuracy().await.unwrap();
        assert_eq!(snapshot.generation(), 2);
        assert_eq!(report.total, snapshot.info().matches_processed);
        assert_eq!(report.total, 2);
    }

    #[tokio::test]
    async fn test_empty_source_publishes_nothing() {
        let service = service(vec![RawMatch::default()]);

        assert_eq!(service.rebuild().await, Err(EngineError::EmptyLog));
        assert_eq!(service.snapshot().generation(), 0);
        assert!(!service.is_rebuilding());
    }

    #[tokio::test]
    async fn test_query_metrics() {
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let calculator = TrueSkillRatingCalculator::new(RatingConfig::default()).unwrap();
        let service = PredictionService::with_metrics(
            Arc::new(StaticMatchSource::new(vec![RawMatch::new(
                &["1A"],
                &["2B"],
                3,
                1,
            )])),
            Arc::new(calculator),
            metrics.clone(),
        );

        service.rebuild().await.unwrap();
        service.team_detail("1A").unwrap();
        assert!(service.team_detail("ZZ").is_err());
        service.evaluate_accuracy().await.unwrap();

        let queries = &metrics.query().queries_total;
        assert_eq!(
            queries.with_label_values(&["team_detail", "success"]).get(),
            1
        );
        assert_eq!(
            queries.with_label_values(&["team_detail", "error"]).get(),
            1
        );
        assert_eq!(metrics.query().last_accuracy.get(), 1.0);
    }
}
