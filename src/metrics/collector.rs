//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the alliance-skill engine
//! using Prometheus metrics.

use anyhow::Result;
use prometheus::{
    Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the rating engine
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Rebuild metrics
    rebuild_metrics: RebuildMetrics,

    /// Query metrics
    query_metrics: QueryMetrics,
}

/// Rebuild-related metrics
#[derive(Clone)]
pub struct RebuildMetrics {
    /// Rebuild requests by final status
    pub rebuilds_total: IntCounterVec,

    /// Time spent draining the match log
    pub rebuild_duration_seconds: Histogram,

    /// Valid matches applied to a staging store
    pub matches_processed_total: IntCounter,

    /// Records rejected during ingestion, by reason
    pub records_rejected_total: IntCounterVec,

    /// Teams in the published snapshot
    pub known_teams: IntGauge,

    /// Generation of the published snapshot
    pub snapshot_generation: IntGauge,
}

/// Query-related metrics
#[derive(Clone)]
pub struct QueryMetrics {
    /// Queries by operation and status
    pub queries_total: IntCounterVec,

    /// Most recent self-consistency accuracy (0.0 to 1.0)
    pub last_accuracy: Gauge,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let rebuild_metrics = RebuildMetrics::new(&registry)?;
        let query_metrics = QueryMetrics::new(&registry)?;

        Ok(Self {
            registry,
            rebuild_metrics,
            query_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get rebuild metrics
    pub fn rebuild(&self) -> &RebuildMetrics {
        &self.rebuild_metrics
    }

    /// Get query metrics
    pub fn query(&self) -> &QueryMetrics {
        &self.query_metrics
    }

    /// Record a rebuild that published a snapshot
    pub fn record_rebuild_published(
        &self,
        duration: Duration,
        matches_processed: usize,
        known_teams: usize,
        generation: u64,
    ) {
        self.rebuild_metrics
            .rebuilds_total
            .with_label_values(&["success"])
            .inc();
        self.rebuild_metrics
            .rebuild_duration_seconds
            .observe(duration.as_secs_f64());
        self.rebuild_metrics
            .matches_processed_total
            .inc_by(matches_processed as u64);
        self.rebuild_metrics.known_teams.set(known_teams as i64);
        self.rebuild_metrics
            .snapshot_generation
            .set(generation as i64);
    }

    /// Record a rebuild that ended without publishing
    pub fn record_rebuild_failed(&self, status: &str) {
        self.rebuild_metrics
            .rebuilds_total
            .with_label_values(&[status])
            .inc();
    }

    /// Record a record rejected during ingestion
    pub fn record_rejected(&self, reason: &str) {
        self.rebuild_metrics
            .records_rejected_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record a query against the published snapshot
    pub fn record_query(&self, operation: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.query_metrics
            .queries_total
            .with_label_values(&[operation, status])
            .inc();
    }

    /// Record the latest accuracy evaluation
    pub fn record_accuracy(&self, accuracy: f64) {
        self.query_metrics.last_accuracy.set(accuracy);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl RebuildMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let rebuilds_total = IntCounterVec::new(
            Opts::new(
                "alliance_skill_rebuilds_total",
                "Rebuild requests by final status",
            ),
            &["status"],
        )?;
        registry.register(Box::new(rebuilds_total.clone()))?;

        let rebuild_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "alliance_skill_rebuild_duration_seconds",
                "Time spent recomputing ratings from the match log",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0]),
        )?;
        registry.register(Box::new(rebuild_duration_seconds.clone()))?;

        let matches_processed_total = IntCounter::new(
            "alliance_skill_matches_processed_total",
            "Valid matches applied during rebuilds",
        )?;
        registry.register(Box::new(matches_processed_total.clone()))?;

        let records_rejected_total = IntCounterVec::new(
            Opts::new(
                "alliance_skill_records_rejected_total",
                "Match records rejected during ingestion",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(records_rejected_total.clone()))?;

        let known_teams = IntGauge::new(
            "alliance_skill_known_teams",
            "Teams in the published snapshot",
        )?;
        registry.register(Box::new(known_teams.clone()))?;

        let snapshot_generation = IntGauge::new(
            "alliance_skill_snapshot_generation",
            "Generation of the published snapshot",
        )?;
        registry.register(Box::new(snapshot_generation.clone()))?;

        Ok(Self {
            rebuilds_total,
            rebuild_duration_seconds,
            matches_processed_total,
            records_rejected_total,
            known_teams,
            snapshot_generation,
        })
    }
}

impl QueryMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let queries_total = IntCounterVec::new(
            Opts::new(
                "alliance_skill_queries_total",
                "Queries against the published snapshot",
            ),
            &["operation", "status"],
        )?;
        registry.register(Box::new(queries_total.clone()))?;

        let last_accuracy = Gauge::new(
            "alliance_skill_last_accuracy",
            "Most recent self-consistency accuracy",
        )?;
        registry.register(Box::new(last_accuracy.clone()))?;

        Ok(Self {
            queries_total,
            last_accuracy,
        })
    }
}
