//! Metrics and monitoring for the alliance-skill service
//!
//! This module provides Prometheus metrics collection for rebuilds and
//! queries, and the HTTP server that exposes them with health checks.

pub mod collector;
pub mod health;

pub use collector::{MetricsCollector, MetricsTimer, QueryMetrics, RebuildMetrics};
pub use health::{HealthServer, HealthServerConfig};
