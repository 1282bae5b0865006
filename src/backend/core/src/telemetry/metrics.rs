//! Prometheus metrics for startup tasks, health probes and circuit breakers.
//!
//! # Example
//!
//! ```rust,no_run
//! use ignite_core::telemetry::metrics::StartupMetrics;
//!
//! StartupMetrics::record_task("database-migrations", "completed", 0.42);
//! ```

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;

use crate::health::{CircuitState, HealthStatus};

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Address for the Prometheus scrape endpoint; no listener when absent
    #[serde(default)]
    pub endpoint: Option<SocketAddr>,

    /// Histogram buckets for durations (in seconds)
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,

    /// Global labels to add to all metrics
    #[serde(default)]
    pub global_labels: HashMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            endpoint: None,
            duration_buckets: default_duration_buckets(),
            global_labels: HashMap::new(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_duration_buckets() -> Vec<f64> {
    vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
}

/// Handle to the installed recorder.
pub struct MetricsRegistry {
    prometheus_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("prometheus_handle", &self.prometheus_handle.is_some())
            .finish()
    }
}

impl MetricsRegistry {
    /// A registry with no recorder installed.
    pub fn disabled() -> Self {
        Self {
            prometheus_handle: None,
        }
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.prometheus_handle
            .as_ref()
            .map(|h| h.render())
            .unwrap_or_default()
    }
}

/// Initialize the metrics subsystem.
///
/// Installing the HTTP listener requires a running tokio runtime.
///
/// # Errors
///
/// Returns an error if the buckets are invalid or a recorder is already
/// installed.
pub fn init_metrics(config: &MetricsConfig, service_name: &str) -> anyhow::Result<MetricsRegistry> {
    if !config.enabled {
        return Ok(MetricsRegistry::disabled());
    }

    let mut builder = PrometheusBuilder::new().add_global_label("service", service_name);
    for (key, value) in &config.global_labels {
        builder = builder.add_global_label(key, value);
    }
    builder = builder.set_buckets(&config.duration_buckets)?;

    let handle = match config.endpoint {
        Some(addr) => {
            let (recorder, exporter) = builder.with_http_listener(addr).build()?;
            let handle = recorder.handle();
            metrics::set_global_recorder(recorder)
                .map_err(|_| anyhow::anyhow!("a metrics recorder is already installed"))?;
            tokio::spawn(async move {
                if let Err(e) = exporter.await {
                    tracing::warn!(error = ?e, "Prometheus exporter stopped");
                }
            });
            handle
        }
        None => builder.install_recorder()?,
    };

    register_metric_descriptions();

    tracing::info!(
        service_name = %service_name,
        endpoint = ?config.endpoint,
        "Metrics initialized"
    );

    Ok(MetricsRegistry {
        prometheus_handle: Some(handle),
    })
}

fn register_metric_descriptions() {
    describe_histogram!(
        "ignite_startup_task_duration_seconds",
        "Startup task execution duration in seconds"
    );
    describe_counter!("ignite_startup_tasks_total", "Startup tasks executed by outcome");

    describe_histogram!(
        "ignite_health_probe_duration_seconds",
        "Health probe duration in seconds, including retries"
    );
    describe_counter!(
        "ignite_health_probe_results_total",
        "Health probe results by service and status"
    );
    describe_gauge!(
        "ignite_health_overall_status",
        "Overall health (0=healthy, 1=degraded, 2=unhealthy)"
    );

    describe_counter!(
        "ignite_circuit_breaker_trips_total",
        "Total circuit breaker trips"
    );
    describe_gauge!(
        "ignite_circuit_breaker_state",
        "Circuit breaker state (0=closed, 1=half-open, 2=open)"
    );

    describe_counter!("ignite_errors_total", "Total number of errors by code");
}

/// Metrics emitted by the startup runner.
pub struct StartupMetrics;

impl StartupMetrics {
    pub fn record_task(task: &str, outcome: &'static str, duration_seconds: f64) {
        histogram!(
            "ignite_startup_task_duration_seconds",
            "task" => task.to_string(),
        )
        .record(duration_seconds);

        counter!(
            "ignite_startup_tasks_total",
            "task" => task.to_string(),
            "outcome" => outcome,
        )
        .increment(1);
    }
}

/// Metrics emitted by the health probe engine.
pub struct HealthMetrics;

impl HealthMetrics {
    pub fn record_probe(service: &str, status: HealthStatus, duration_seconds: f64) {
        histogram!(
            "ignite_health_probe_duration_seconds",
            "service" => service.to_string(),
        )
        .record(duration_seconds);

        counter!(
            "ignite_health_probe_results_total",
            "service" => service.to_string(),
            "status" => status.as_str(),
        )
        .increment(1);
    }

    pub fn record_overall(status: HealthStatus) {
        let value = match status {
            HealthStatus::Healthy => 0.0,
            HealthStatus::Degraded | HealthStatus::Unavailable => 1.0,
            HealthStatus::Unhealthy => 2.0,
        };
        gauge!("ignite_health_overall_status").set(value);
    }

    pub fn record_breaker_state(service: &str, state: CircuitState) {
        let value = match state {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        };
        gauge!("ignite_circuit_breaker_state", "service" => service.to_string()).set(value);
        if state == CircuitState::Open {
            counter!("ignite_circuit_breaker_trips_total", "service" => service.to_string())
                .increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_registry_renders_empty() {
        let config = MetricsConfig {
            enabled: false,
            ..Default::default()
        };
        let registry = init_metrics(&config, "ignite-test").unwrap();
        assert!(registry.render().is_empty());
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        StartupMetrics::record_task("noop", "completed", 0.01);
        HealthMetrics::record_probe("noop", HealthStatus::Healthy, 0.01);
        HealthMetrics::record_overall(HealthStatus::Degraded);
        HealthMetrics::record_breaker_state("noop", CircuitState::Open);
    }
}
