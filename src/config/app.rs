//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! alliance-skill service, including environment variable loading, TOML
//! files and validation.

use crate::config::rating::RatingConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub data: DataSettings,
    pub rating: RatingConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health and metrics endpoints
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Periodic rebuild interval in seconds, 0 disables periodic rebuilds
    pub rebuild_interval_seconds: u64,
}

/// Match data settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// JSON file holding the chronological match log
    pub match_log_path: PathBuf,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "alliance-skill".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
            rebuild_interval_seconds: 0,
        }
    }
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            match_log_path: PathBuf::from("data/matches.json"),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        override_parsed("HEALTH_PORT", &mut self.service.health_port)?;
        override_parsed(
            "SHUTDOWN_TIMEOUT_SECONDS",
            &mut self.service.shutdown_timeout_seconds,
        )?;
        override_parsed(
            "REBUILD_INTERVAL_SECONDS",
            &mut self.service.rebuild_interval_seconds,
        )?;

        // Data settings
        if let Ok(path) = env::var("MATCH_LOG_PATH") {
            self.data.match_log_path = PathBuf::from(path);
        }

        // Rating settings
        override_parsed("RATING_INITIAL_MU", &mut self.rating.initial_mu)?;
        override_parsed("RATING_INITIAL_SIGMA", &mut self.rating.initial_sigma)?;
        override_parsed("RATING_BETA", &mut self.rating.beta)?;
        override_parsed("RATING_SIGMA_MIN", &mut self.rating.sigma_min)?;
        override_parsed(
            "RATING_DRAW_PROBABILITY",
            &mut self.rating.draw_probability,
        )?;

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get the periodic rebuild interval, if enabled
    pub fn rebuild_interval(&self) -> Option<Duration> {
        match self.service.rebuild_interval_seconds {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        }
    }
}

fn override_parsed<T: FromStr>(key: &str, target: &mut T) -> Result<()> {
    if let Ok(value) = env::var(key) {
        *target = value
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", key, value))?;
    }
    Ok(())
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }

    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    if config.data.match_log_path.as_os_str().is_empty() {
        return Err(anyhow!("Match log path cannot be empty"));
    }

    config.rating.validate()?;

    Ok(())
}
