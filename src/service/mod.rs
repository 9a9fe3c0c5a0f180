//! Service layer for the alliance-skill engine
//!
//! This module contains the prediction service, the production application
//! state with its background rebuild task, and health reporting.

pub mod app;
pub mod health;
pub mod prediction;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
pub use prediction::PredictionService;
