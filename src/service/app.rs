//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the prediction
//! service to its match source, metrics, health endpoints and background
//! rebuild task.

use crate::config::AppConfig;
use crate::error::EngineError;
use crate::match_log::{JsonFileMatchSource, MatchSource};
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector};
use crate::rating::TrueSkillRatingCalculator;
use crate::service::prediction::PredictionService;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Rating engine and query surface
    prediction: PredictionService,

    metrics_collector: Arc<MetricsCollector>,

    health_server: Arc<HealthServer>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    /// Wakes background loops parked between rebuilds
    shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Initialize the application, reading matches from the configured JSON file
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        let source = Arc::new(JsonFileMatchSource::new(
            config.data.match_log_path.clone(),
        ));
        Self::with_source(config, source)
    }

    /// Initialize the application around an explicit match source
    pub fn with_source(
        config: AppConfig,
        source: Arc<dyn MatchSource>,
    ) -> Result<Self, ServiceError> {
        info!("Initializing {} service", config.service.name);
        info!(
            "Configuration: source={}, health_port={}, rebuild_interval={}s",
            source.describe(),
            config.service.health_port,
            config.service.rebuild_interval_seconds
        );

        let calculator = TrueSkillRatingCalculator::new(config.rating.clone()).map_err(|e| {
            ServiceError::Configuration {
                message: format!("Invalid rating configuration: {}", e),
            }
        })?;

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let prediction =
            PredictionService::with_metrics(source, Arc::new(calculator), metrics_collector.clone());

        let health_config = HealthServerConfig {
            port: config.service.health_port,
            host: "0.0.0.0".to_string(),
            service_name: config.service.name.clone(),
        };
        let health_server = Arc::new(
            HealthServer::new(health_config, metrics_collector.clone())
                .with_prediction_service(prediction.clone()),
        );

        Ok(Self {
            config,
            prediction,
            metrics_collector,
            health_server,
            background_tasks: Vec::new(),
            is_running: Arc::new(RwLock::new(false)),
            shutdown_tx: broadcast::channel(1).0,
        })
    }

    /// Run the initial rebuild and start the background services
    ///
    /// A failed initial rebuild is logged but does not stop the service; it
    /// stays degraded until a later rebuild publishes a snapshot.
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting {} service", self.config.service.name);

        *self.is_running.write().await = true;

        self.start_health_server().await;

        match self.prediction.rebuild().await {
            Ok(snapshot) => info!(
                "Initial snapshot published: generation {}, {} teams",
                snapshot.generation(),
                snapshot.len()
            ),
            Err(e) => warn!("Initial rebuild failed, serving without ratings: {}", e),
        }

        self.start_background_tasks();

        info!("✅ {} service started successfully", self.config.service.name);
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of {}", self.config.service.name);

        *self.is_running.write().await = false;

        if self.prediction.cancel_rebuild() {
            info!("Requested cancellation of the in-flight rebuild");
        }

        self.health_server.stop();
        // No receivers just means no periodic task was started
        let _ = self.shutdown_tx.send(());
        self.stop_background_tasks().await?;

        let snapshot = self.prediction.snapshot();
        info!(
            "Final snapshot: generation {}, {} teams",
            snapshot.generation(),
            snapshot.len()
        );

        info!("✅ {} shutdown completed", self.config.service.name);
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn prediction(&self) -> PredictionService {
        self.prediction.clone()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    async fn start_health_server(&mut self) {
        let health_server = self.health_server.clone();
        let port = self.config.service.health_port;

        let handle = tokio::spawn(async move {
            if let Err(e) = health_server.start().await {
                error!("Health server failed: {:#}", e);
            }
        });
        self.background_tasks.push(handle);

        // Give the server a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;
        info!("✅ Health endpoints started on port {}", port);
    }

    fn start_background_tasks(&mut self) {
        let Some(period) = self.config.rebuild_interval() else {
            info!("Periodic rebuilds disabled");
            return;
        };

        info!("Starting periodic rebuild task ({}s interval)", period.as_secs());
        let prediction = self.prediction.clone();
        let is_running = self.is_running.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately and the initial rebuild already ran
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown_rx.recv() => break,
                }
                if !*is_running.read().await {
                    break;
                }

                match prediction.rebuild().await {
                    Ok(snapshot) => debug!(
                        "Periodic rebuild published generation {}",
                        snapshot.generation()
                    ),
                    Err(EngineError::RebuildBusy) => {
                        debug!("Periodic rebuild skipped, another rebuild is in progress")
                    }
                    Err(e) => warn!("Periodic rebuild failed: {}", e),
                }
            }

            info!("Periodic rebuild task stopped");
        });
        self.background_tasks.push(handle);
    }

    /// Wait for background tasks to finish, aborting them after the shutdown timeout
    async fn stop_background_tasks(&mut self) -> Result<(), ServiceError> {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return Ok(());
        }

        info!("Stopping {} background tasks...", task_count);
        let timeout = self.config.shutdown_timeout();
        let mut timed_out = 0;

        for (i, mut task) in self.background_tasks.drain(..).enumerate() {
            debug!("Waiting for background task {}/{}", i + 1, task_count);
            if tokio::time::timeout(timeout, &mut task).await.is_err() {
                warn!("Background task {} did not stop in time, aborting", i + 1);
                task.abort();
                timed_out += 1;
            }
        }

        if timed_out > 0 {
            return Err(ServiceError::BackgroundTask {
                message: format!("{} background tasks were aborted", timed_out),
            });
        }

        info!("✅ All {} background tasks stopped", task_count);
        Ok(())
    }
}
