//! Telemetry: structured logging and Prometheus metrics.
//!
//! # Example
//!
//! ```rust,no_run
//! use ignite_core::config::Environment;
//! use ignite_core::telemetry::{TelemetryConfig, init_telemetry};
//!
//! let config = TelemetryConfig::default();
//! let _handle = init_telemetry(&config, Environment::Development).expect("telemetry");
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig, SpanEventConfig};
pub use metrics::{init_metrics, HealthMetrics, MetricsConfig, MetricsRegistry, StartupMetrics};

use serde::{Deserialize, Serialize};

use crate::config::Environment;

/// Unified telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name attached to logs and metrics
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

fn default_service_name() -> String {
    "ignite".to_string()
}

/// Initialize logging, then metrics. Call once at startup.
///
/// # Errors
///
/// Returns an error if any component fails to initialize.
pub fn init_telemetry(
    config: &TelemetryConfig,
    environment: Environment,
) -> anyhow::Result<TelemetryHandle> {
    init_logging(&config.logging, environment)?;
    let metrics = init_metrics(&config.metrics, &config.service_name)?;
    Ok(TelemetryHandle { metrics })
}

/// Handle for the telemetry stack.
#[derive(Debug)]
pub struct TelemetryHandle {
    pub metrics: MetricsRegistry,
}

impl TelemetryHandle {
    pub fn shutdown(self) {
        ::tracing::info!("Telemetry shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "ignite");
        assert!(config.metrics.enabled);
        assert_eq!(config.logging.level, "info");
    }
}
