//! Health checks and monitoring
//!
//! This module derives the health of the alliance-skill service from the
//! state of its published snapshot and rebuild slot.

use crate::service::prediction::PredictionService;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Optional detail when the component is not healthy
    pub message: Option<String>,
}

/// Snapshot statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Generation of the published snapshot; 0 before the first rebuild
    pub generation: u64,
    pub known_teams: usize,
    pub matches_processed: usize,
    pub matches_rejected: usize,
    pub rebuilding: bool,
    pub built_at: Option<DateTime<Utc>>,
    pub source: String,
}

impl HealthCheck {
    /// Perform a full health check of the prediction service
    pub fn check(service: &PredictionService, service_name: &str) -> Self {
        let snapshot_check = Self::check_snapshot(service);
        let rebuild_check = Self::check_rebuild(service);

        let status = match (&snapshot_check.status, &rebuild_check.status) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
            _ => HealthStatus::Degraded,
        };

        HealthCheck {
            status,
            service: service_name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            checks: vec![snapshot_check, rebuild_check],
            stats: Self::gather_service_stats(service),
        }
    }

    /// Lightweight check: healthy once a snapshot has been published
    pub fn liveness_check(service: &PredictionService) -> HealthStatus {
        Self::check_snapshot(service).status
    }

    fn check_snapshot(service: &PredictionService) -> ComponentCheck {
        let snapshot = service.snapshot();

        let (status, message) = if snapshot.generation() > 0 {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Degraded,
                Some("No snapshot has been published yet".to_string()),
            )
        };
        debug!(
            "Snapshot check: generation {}, status {:?}",
            snapshot.generation(),
            status
        );

        ComponentCheck {
            name: "snapshot".to_string(),
            status,
            message,
        }
    }

    fn check_rebuild(service: &PredictionService) -> ComponentCheck {
        let message = service
            .is_rebuilding()
            .then(|| "Rebuild in progress".to_string());

        ComponentCheck {
            name: "rebuild".to_string(),
            status: HealthStatus::Healthy,
            message,
        }
    }

    fn gather_service_stats(service: &PredictionService) -> ServiceStats {
        let snapshot = service.snapshot();
        let info = snapshot.info();

        ServiceStats {
            generation: info.generation,
            known_teams: snapshot.len(),
            matches_processed: info.matches_processed,
            matches_rejected: info.matches_rejected,
            rebuilding: service.is_rebuilding(),
            built_at: (info.generation > 0).then_some(info.built_at),
            source: service.source_description(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
