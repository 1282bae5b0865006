//! Health probe engine: concurrent execution, aggregation and the admission gate.
//!
//! One pass runs every non-skipped probe on its own task under a
//! [`ProbePolicy`], bounds the batch by the default timeout, orders results by
//! registration and publishes the report. The engine never returns an error;
//! failures of any kind become results.

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::check::{HealthCheckReport, HealthCheckResult, HealthStatus, HEALTH_CHECK_SYSTEM};
use super::circuit_breaker::CircuitBreakerRegistry;
use super::policy::ProbePolicy;
use super::probe::HealthProbe;
use super::state::HealthReportState;
use crate::config::{Environment, HealthCheckConfiguration};
use crate::telemetry::HealthMetrics;

/// Result of the admission gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub reason: String,
}

impl AdmissionDecision {
    fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// Why a batch stopped waiting before every probe finished.
#[derive(Debug, Clone, Copy)]
enum Interruption {
    Deadline,
    Cancelled,
}

pub struct HealthProbeEngine {
    config: Arc<HealthCheckConfiguration>,
    environment: Environment,
    breakers: Arc<CircuitBreakerRegistry>,
    state: HealthReportState,
}

impl HealthProbeEngine {
    pub fn new(
        config: HealthCheckConfiguration,
        environment: Environment,
        state: HealthReportState,
    ) -> Self {
        let breakers = Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker.clone()));
        Self {
            config: Arc::new(config),
            environment,
            breakers,
            state,
        }
    }

    pub fn config(&self) -> &HealthCheckConfiguration {
        &self.config
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn state(&self) -> &HealthReportState {
        &self.state
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    /// Run one health pass over `probes`.
    pub async fn run_all(&self, probes: &[Arc<dyn HealthProbe>]) -> HealthCheckReport {
        self.run_all_with_cancel(probes, &CancellationToken::new()).await
    }

    /// Run one health pass, giving up on unfinished probes when `cancel` fires.
    #[instrument(skip_all, fields(probes = probes.len()))]
    pub async fn run_all_with_cancel(
        &self,
        probes: &[Arc<dyn HealthProbe>],
        cancel: &CancellationToken,
    ) -> HealthCheckReport {
        let start = Instant::now();

        let scheduled: Vec<Arc<dyn HealthProbe>> = probes
            .iter()
            .filter(|probe| {
                let skipped = self.config.is_skipped(probe.name());
                if skipped {
                    debug!(probe = %probe.name(), "Health probe skipped by configuration");
                }
                !skipped
            })
            .cloned()
            .collect();

        let results = match AssertUnwindSafe(self.collect(&scheduled, cancel))
            .catch_unwind()
            .await
        {
            Ok(results) => results,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(error = %message, "Health check system failure");
                vec![HealthCheckResult::unhealthy(HEALTH_CHECK_SYSTEM)
                    .with_description("Health check system failure")
                    .with_error(message)]
            }
        };

        let report = HealthCheckReport::from_results(results, start.elapsed());
        self.record(&report);
        self.state.publish(report.clone());
        report
    }

    async fn collect(
        &self,
        probes: &[Arc<dyn HealthProbe>],
        cancel: &CancellationToken,
    ) -> Vec<HealthCheckResult> {
        let mut slots: Vec<Option<HealthCheckResult>> = vec![None; probes.len()];
        let mut pending = FuturesUnordered::new();

        for (index, probe) in probes.iter().enumerate() {
            let policy = ProbePolicy::from_config(
                &self.config,
                probe.as_ref(),
                self.breakers.get(probe.name()),
            );
            let probe = Arc::clone(probe);
            let handle = tokio::spawn(async move { policy.execute(probe).await });
            pending.push(async move { (index, handle.await) });
        }

        let batch_timeout = self.config.default_timeout;
        let deadline = tokio::time::sleep(batch_timeout);
        tokio::pin!(deadline);

        let mut interrupted = None;
        while !pending.is_empty() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    interrupted = Some(Interruption::Cancelled);
                    break;
                }
                _ = &mut deadline => {
                    interrupted = Some(Interruption::Deadline);
                    break;
                }
                Some((index, joined)) = pending.next() => {
                    let result = joined.unwrap_or_else(|e| {
                        HealthCheckResult::unhealthy(probes[index].name())
                            .with_description("Probe task panicked")
                            .with_error(e.to_string())
                    });
                    slots[index] = Some(result);
                }
            }
        }

        // Dropping the join handles detaches any probe still running.
        drop(pending);

        slots
            .into_iter()
            .zip(probes)
            .map(|(slot, probe)| {
                slot.unwrap_or_else(|| match interrupted {
                    Some(Interruption::Cancelled) => HealthCheckResult::unhealthy(probe.name())
                        .with_description("Health check cancelled")
                        .with_attempts(0),
                    _ => HealthCheckResult::timed_out(probe.name(), batch_timeout),
                })
            })
            .collect()
    }

    fn record(&self, report: &HealthCheckReport) {
        for result in &report.results {
            HealthMetrics::record_probe(
                &result.service_name,
                result.status,
                result.duration.as_secs_f64(),
            );
            if result.status.is_failure() {
                warn!(
                    service = %result.service_name,
                    status = %result.status,
                    description = %result.description,
                    error = result.error.as_deref().unwrap_or(""),
                    attempts = result.attempts,
                    "Health probe failed"
                );
            }
        }
        HealthMetrics::record_overall(report.overall_status);

        info!(
            overall = %report.overall_status,
            total = report.summary.total,
            healthy = report.summary.healthy,
            degraded = report.summary.degraded,
            unhealthy = report.summary.unhealthy,
            unavailable = report.summary.unavailable,
            duration_ms = report.total_duration.as_millis() as u64,
            "Health check pass complete"
        );
    }

    /// Whether the application may start given `report`.
    pub fn can_start(&self, report: &HealthCheckReport) -> bool {
        self.admission(report).allowed
    }

    /// Admission decision with the reason behind it.
    pub fn admission(&self, report: &HealthCheckReport) -> AdmissionDecision {
        if self.config.continue_on_failure {
            return AdmissionDecision::allow("continue_on_failure is enabled");
        }

        let critical: Vec<&str> = report
            .results
            .iter()
            .filter(|r| r.status == HealthStatus::Unhealthy && self.config.is_critical(&r.service_name))
            .map(|r| r.service_name.as_str())
            .collect();

        if !critical.is_empty() {
            if self.environment.is_production() {
                return AdmissionDecision::deny(format!(
                    "Critical services unhealthy: {}",
                    critical.join(", ")
                ));
            }
            warn!(
                services = %critical.join(", "),
                environment = %self.environment,
                "Critical services unhealthy; startup allowed outside production"
            );
        }

        let rate = report.failure_rate();
        if rate > self.config.max_failure_rate {
            return AdmissionDecision::deny(format!(
                "{:.0}% of health checks failed (limit {:.0}%)",
                rate * 100.0,
                self.config.max_failure_rate * 100.0
            ));
        }

        AdmissionDecision::allow(if report.failing().next().is_none() {
            "all health checks passed"
        } else {
            "failures within tolerance"
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
