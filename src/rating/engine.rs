//! The rating engine: full rebuilds and snapshot publication
//!
//! A rebuild drains a [`MatchLog`] in order into a private [`RatingStore`]
//! and, only once every record has been applied, swaps the resulting
//! [`SkillSnapshot`] into the publish slot. Readers clone the current
//! `Arc<SkillSnapshot>` and keep using it for as long as they like; a publish
//! never changes a snapshot someone already holds.
//!
//! Rebuilds are order sensitive. Each match is rated against the ratings
//! produced by the matches before it, so re-ordering the log yields a
//! different final snapshot. Given the same log in the same order a rebuild
//! always produces the same ratings.

use crate::error::{EngineError, Result};
use crate::match_log::MatchLog;
use crate::metrics::MetricsCollector;
use crate::rating::calculator::RatingCalculator;
use crate::rating::predictor::AlliancePredictor;
use crate::rating::storage::{RatingStore, SkillSnapshot, SnapshotInfo};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct EngineInner {
    calculator: Arc<dyn RatingCalculator>,
    published: RwLock<Arc<SkillSnapshot>>,
    rebuilding: AtomicBool,
    cancel_requested: AtomicBool,
    last_generation: AtomicU64,
    metrics: Option<Arc<MetricsCollector>>,
}

/// Handle to the rating engine
///
/// Cloning the handle is cheap and every clone refers to the same engine.
#[derive(Clone)]
pub struct RatingEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for RatingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatingEngine")
            .field("generation", &self.snapshot().generation())
            .field("rebuilding", &self.is_rebuilding())
            .finish()
    }
}

impl RatingEngine {
    /// Create an engine with an empty published snapshot
    pub fn new(calculator: Arc<dyn RatingCalculator>) -> Self {
        Self::build(calculator, None)
    }

    /// Create an engine that reports rebuild metrics
    pub fn with_metrics(
        calculator: Arc<dyn RatingCalculator>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self::build(calculator, Some(metrics))
    }

    fn build(
        calculator: Arc<dyn RatingCalculator>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                calculator,
                published: RwLock::new(Arc::new(SkillSnapshot::empty())),
                rebuilding: AtomicBool::new(false),
                cancel_requested: AtomicBool::new(false),
                last_generation: AtomicU64::new(0),
                metrics,
            }),
        }
    }

    /// The currently published snapshot
    pub fn snapshot(&self) -> Arc<SkillSnapshot> {
        let published = self
            .inner
            .published
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&published)
    }

    /// A predictor bound to the currently published snapshot
    pub fn predictor(&self) -> AlliancePredictor {
        AlliancePredictor::new(self.snapshot(), self.inner.calculator.beta())
    }

    pub fn calculator(&self) -> &Arc<dyn RatingCalculator> {
        &self.inner.calculator
    }

    /// True while a rebuild holds the rebuild permit
    pub fn is_rebuilding(&self) -> bool {
        self.inner.rebuilding.load(Ordering::Acquire)
    }

    /// Claim the single rebuild slot, failing fast if it is taken
    pub fn try_begin_rebuild(&self) -> Result<RebuildPermit> {
        if self
            .inner
            .rebuilding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Rejecting rebuild request: a rebuild is already in progress");
            if let Some(metrics) = &self.inner.metrics {
                metrics.record_rebuild_failed(EngineError::RebuildBusy.kind());
            }
            return Err(EngineError::RebuildBusy);
        }

        self.inner.cancel_requested.store(false, Ordering::Release);

        let permit = RebuildPermit {
            engine: self.clone(),
            rebuild_id: Uuid::new_v4(),
        };
        debug!("Rebuild {} acquired the rebuild permit", permit.rebuild_id);
        Ok(permit)
    }

    /// Recompute every rating from `log` and publish the result
    pub fn rebuild(&self, log: &MatchLog) -> Result<Arc<SkillSnapshot>> {
        self.try_begin_rebuild()?.run(log)
    }

    /// Ask the in-flight rebuild to stop without publishing
    ///
    /// Returns `false` when no rebuild is running.
    pub fn cancel_rebuild(&self) -> bool {
        if !self.is_rebuilding() {
            return false;
        }
        info!("Cancellation requested for the in-flight rebuild");
        self.inner.cancel_requested.store(true, Ordering::Release);
        true
    }

    fn cancellation_requested(&self) -> bool {
        self.inner.cancel_requested.load(Ordering::Acquire)
    }

    fn publish(&self, snapshot: Arc<SkillSnapshot>) {
        let mut published = self
            .inner
            .published
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *published = snapshot;
    }
}

/// Exclusive right to run one rebuild
///
/// Dropping the permit, whether the rebuild finished, failed or was never
/// started, frees the rebuild slot.
pub struct RebuildPermit {
    engine: RatingEngine,
    rebuild_id: Uuid,
}

impl RebuildPermit {
    pub fn rebuild_id(&self) -> Uuid {
        self.rebuild_id
    }

    /// Drain `log` into a staging store and publish it on success
    pub fn run(self, log: &MatchLog) -> Result<Arc<SkillSnapshot>> {
        let engine = &self.engine;
        let metrics = engine.inner.metrics.as_deref();
        let started = Instant::now();

        if let Some(metrics) = metrics {
            for rejected in log.rejected() {
                metrics.record_rejected(rejected.reason.label());
            }
        }

        if log.is_empty() {
            warn!(
                "Rebuild {} aborted: match log has no valid records ({} rejected)",
                self.rebuild_id,
                log.rejected().len()
            );
            if let Some(metrics) = metrics {
                metrics.record_rebuild_failed(EngineError::EmptyLog.kind());
            }
            return Err(EngineError::EmptyLog);
        }

        info!(
            "Rebuild {} started: {} valid records, {} rejected",
            self.rebuild_id,
            log.len(),
            log.rejected().len()
        );

        let calculator = engine.inner.calculator.as_ref();
        let mut staging = RatingStore::new();

        for record in log {
            if engine.cancellation_requested() {
                return Err(self.cancelled());
            }

            let update = staging.apply(record, calculator).map_err(|e| {
                if let Some(metrics) = metrics {
                    metrics.record_rebuild_failed(e.kind());
                }
                e
            })?;

            debug!(
                "Applied match {} ({}), red win predicted at {:.3}",
                update.position, update.outcome, update.predicted_red_win
            );
        }

        if engine.cancellation_requested() {
            return Err(self.cancelled());
        }

        let generation = engine.inner.last_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = Arc::new(staging.into_snapshot(SnapshotInfo {
            generation,
            rebuild_id: Some(self.rebuild_id),
            built_at: Utc::now(),
            matches_processed: log.len(),
            matches_rejected: log.rejected().len(),
        }));

        engine.publish(Arc::clone(&snapshot));

        let elapsed = started.elapsed();
        if let Some(metrics) = metrics {
            metrics.record_rebuild_published(elapsed, log.len(), snapshot.len(), generation);
        }

        info!(
            "Rebuild {} published generation {}: {} teams from {} matches in {:.2}ms",
            self.rebuild_id,
            generation,
            snapshot.len(),
            log.len(),
            elapsed.as_secs_f64() * 1000.0
        );

        Ok(snapshot)
    }

    fn cancelled(&self) -> EngineError {
        warn!(
            "Rebuild {} cancelled, discarding staging store",
            self.rebuild_id
        );
        if let Some(metrics) = &self.engine.inner.metrics {
            metrics.record_rebuild_failed(EngineError::RebuildCancelled.kind());
        }
        EngineError::RebuildCancelled
    }
}

impl Drop for RebuildPermit {
    fn drop(&mut self) {
        self.engine
            .inner
            .cancel_requested
            .store(false, Ordering::Release);
        self.engine.inner.rebuilding.store(false, Ordering::Release);
        debug!("Rebuild {} released the rebuild permit", self.rebuild_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RatingConfig;
    use crate::match_log::RawMatch;
    use crate::rating::calculator::MockRatingCalculator;
    use crate::rating::trueskill::TrueSkillRatingCalculator;

    fn trueskill_engine() -> RatingEngine {
        let calculator = TrueSkillRatingCalculator::new(RatingConfig::default()).unwrap();
        RatingEngine::new(Arc::new(calculator))
    }

    fn sample_log() -> MatchLog {
        MatchLog::ingest(vec![
            RawMatch::new(&["1A", "2B"], &["3C", "4D"], 20, 10),
            RawMatch::new(&["1A", "3C"], &["2B", "4D"], 15, 15),
            RawMatch::new(&["4D", "2B"], &["1A", "3C"], 5, 30),
        ])
    }

    #[test]
    fn test_fresh_engine_has_empty_snapshot() {
        let engine = trueskill_engine();
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.generation(), 0);
        assert!(snapshot.is_empty());
        assert!(!engine.is_rebuilding());
    }

    #[test]
    fn test_rebuild_publishes_snapshot() {
        let engine = trueskill_engine();
        let snapshot = engine.rebuild(&sample_log()).unwrap();

        assert_eq!(snapshot.generation(), 1);
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.info().matches_processed, 3);
        assert_eq!(snapshot.get("1A").unwrap().matches_played, 3);
        assert!(Arc::ptr_eq(&snapshot, &engine.snapshot()));
        assert!(!engine.is_rebuilding());
    }

    #[test]
    fn test_single_match_moves_ratings() {
        let engine = trueskill_engine();
        let log = MatchLog::ingest(vec![RawMatch::new(&["T1"], &["T2"], 10, 0)]);
        let snapshot = engine.rebuild(&log).unwrap();

        let t1 = snapshot.rating("T1").unwrap();
        let t2 = snapshot.rating("T2").unwrap();
        assert!(t1.mu > 25.0);
        assert!(t2.mu < 25.0);
    }

    #[test]
    fn test_empty_log_is_rejected_without_publishing() {
        let engine = trueskill_engine();
        let log = MatchLog::ingest(vec![RawMatch::new(&["1A", "1A"], &["2B"], 1, 0)]);

        assert_eq!(engine.rebuild(&log), Err(EngineError::EmptyLog));
        assert_eq!(engine.snapshot().generation(), 0);
        assert!(!engine.is_rebuilding());
    }

    #[test]
    fn test_invalid_records_never_reach_calculator() {
        let calculator = Arc::new(MockRatingCalculator::new());
        let engine = RatingEngine::new(calculator.clone());
        let log = MatchLog::ingest(vec![
            RawMatch::new(&["1A"], &["2B"], 1, 0),
            RawMatch::new(&["1A", "1A"], &["2B"], 1, 0),
            RawMatch::new(&["2B"], &["3C"], 1, 0),
        ]);

        let snapshot = engine.rebuild(&log).unwrap();
        assert_eq!(calculator.get_calculation_calls().len(), 2);
        assert_eq!(snapshot.info().matches_rejected, 1);
    }

    #[test]
    fn test_busy_while_permit_held() {
        let engine = trueskill_engine();
        let first = engine.rebuild(&sample_log()).unwrap();

        let permit = engine.try_begin_rebuild().unwrap();
        assert!(engine.is_rebuilding());
        assert_eq!(
            engine.rebuild(&sample_log()).unwrap_err(),
            EngineError::RebuildBusy
        );

        let second = permit.run(&sample_log()).unwrap();
        assert_eq!(second.generation(), first.generation() + 1);
        assert!(second.ratings_match(&first, 1e-12));
        assert!(!engine.is_rebuilding());
    }

    #[test]
    fn test_dropped_permit_frees_slot() {
        let engine = trueskill_engine();
        let permit = engine.try_begin_rebuild().unwrap();
        drop(permit);
        assert!(engine.try_begin_rebuild().is_ok());
    }

    #[test]
    fn test_cancelled_rebuild_does_not_publish() {
        let engine = trueskill_engine();
        assert!(!engine.cancel_rebuild());

        let permit = engine.try_begin_rebuild().unwrap();
        assert!(engine.cancel_rebuild());

        assert_eq!(
            permit.run(&sample_log()).unwrap_err(),
            EngineError::RebuildCancelled
        );
        assert_eq!(engine.snapshot().generation(), 0);

        // A later rebuild is not affected by the old cancellation
        assert!(engine.rebuild(&sample_log()).is_ok());
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let engine = trueskill_engine();
        let first = engine.rebuild(&sample_log()).unwrap();
        let second = engine.rebuild(&sample_log()).unwrap();

        assert!(first.ratings_match(&second, 1e-12));
        assert_eq!(second.generation(), 2);
    }

    #[test]
    fn test_rebuild_is_order_sensitive() {
        let engine = trueskill_engine();
        let forward = engine
            .rebuild(&MatchLog::ingest(vec![
                RawMatch::new(&["1A"], &["2B"], 10, 0),
                RawMatch::new(&["2B"], &["1A"], 10, 0),
            ]))
            .unwrap();
        let reversed = engine
            .rebuild(&MatchLog::ingest(vec![
                RawMatch::new(&["2B"], &["1A"], 10, 0),
                RawMatch::new(&["1A"], &["2B"], 10, 0),
            ]))
            .unwrap();

        assert!(!forward.ratings_match(&reversed, 1e-9));
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let engine = trueskill_engine();
        engine.rebuild(&sample_log()).unwrap();
        let held = engine.snapshot();

        engine
            .rebuild(&MatchLog::ingest(vec![RawMatch::new(&["9Z"], &["8Y"], 1, 0)]))
            .unwrap();

        assert_eq!(held.generation(), 1);
        assert!(held.contains("1A"));
        assert!(!engine.snapshot().contains("1A"));
    }

    #[test]
    fn test_rebuild_metrics() {
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let calculator = TrueSkillRatingCalculator::new(RatingConfig::default()).unwrap();
        let engine = RatingEngine::with_metrics(Arc::new(calculator), metrics.clone());

        engine.rebuild(&sample_log()).unwrap();
        let _permit = engine.try_begin_rebuild().unwrap();
        assert!(engine.rebuild(&sample_log()).is_err());

        let rebuild = metrics.rebuild();
        assert_eq!(
            rebuild.rebuilds_total.with_label_values(&["success"]).get(),
            1
        );
        assert_eq!(rebuild.rebuilds_total.with_label_values(&["busy"]).get(), 1);
        assert_eq!(rebuild.known_teams.get(), 4);
        assert_eq!(rebuild.snapshot_generation.get(), 1);
    }
}
