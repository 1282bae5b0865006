//! Probe execution policy: timeout, retry with exponential backoff, circuit breaker.
//!
//! Policies compose around a probe and never change its outcome semantics:
//! whatever status the probe reports is what ends up in the report, except
//! that an error becomes `Unhealthy`, a timeout becomes a timed-out
//! placeholder and an open breaker becomes `Unavailable`.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::check::HealthCheckResult;
use super::circuit_breaker::CircuitBreaker;
use super::probe::HealthProbe;
use crate::config::HealthCheckConfiguration;

/// How a single probe is executed.
#[derive(Clone)]
pub struct ProbePolicy {
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    breaker: Option<Arc<CircuitBreaker>>,
}

impl ProbePolicy {
    /// One attempt, bounded by `timeout`, no breaker.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            max_retries: 0,
            retry_delay: Duration::ZERO,
            breaker: None,
        }
    }

    /// Policy for `probe` as configured.
    pub fn from_config(
        config: &HealthCheckConfiguration,
        probe: &dyn HealthProbe,
        breaker: Option<Arc<CircuitBreaker>>,
    ) -> Self {
        let timeout = probe
            .timeout()
            .unwrap_or_else(|| config.timeout_for(probe.kind()));
        let mut policy = Self::new(timeout).with_retry(config.max_retries, config.retry_delay);
        policy.breaker = breaker;
        policy
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retry up to `max_retries` times, waiting `base * 2^(n-1)` before retry `n`.
    pub fn with_retry(mut self, max_retries: u32, base: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = base;
        self
    }

    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.retry_delay.saturating_mul(1u32 << exponent)
    }

    /// Run the probe under this policy. Never fails; every outcome is a result.
    pub async fn execute(&self, probe: Arc<dyn HealthProbe>) -> HealthCheckResult {
        let name = probe.name().to_string();
        let start = Instant::now();

        if let Some(breaker) = &self.breaker {
            if !breaker.can_execute() {
                debug!(probe = %name, "Circuit open, skipping probe");
                return HealthCheckResult::unavailable(&name)
                    .with_description("Circuit breaker open; probe skipped")
                    .with_attempts(0);
            }
        }

        let mut attempt = 0;
        let mut result = loop {
            attempt += 1;
            let result = self.attempt(&probe, &name).await;
            if !result.status.is_failure() || attempt > self.max_retries {
                break result.with_attempts(attempt);
            }

            let delay = self.backoff(attempt);
            warn!(
                probe = %name,
                attempt = attempt,
                status = %result.status,
                delay_ms = delay.as_millis() as u64,
                "Health probe failed, retrying"
            );
            tokio::time::sleep(delay).await;
        };

        // The breaker sees one outcome per pass, after retries are spent.
        if let Some(breaker) = &self.breaker {
            if result.status.is_failure() {
                breaker.record_failure();
            } else {
                breaker.record_success();
            }
        }

        if attempt > 1 {
            result.duration = start.elapsed();
        }
        result
    }

    /// One bounded attempt. A probe that overruns keeps running detached; its
    /// eventual outcome is discarded.
    async fn attempt(&self, probe: &Arc<dyn HealthProbe>, name: &str) -> HealthCheckResult {
        let start = Instant::now();
        let task = {
            let probe = Arc::clone(probe);
            tokio::spawn(async move { probe.check().await })
        };

        let mut result = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => {
                warn!(probe = %name, timeout_ms = self.timeout.as_millis() as u64, "Health probe timed out");
                return HealthCheckResult::timed_out(name, self.timeout);
            }
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => HealthCheckResult::unhealthy(name)
                .with_description(format!("Probe failed: {}", e.message()))
                .with_error(e.to_string()),
            Ok(Err(join_error)) => HealthCheckResult::unhealthy(name)
                .with_description("Probe panicked")
                .with_error(join_error.to_string()),
        };

        result.service_name = name.to_string();
        if result.duration.is_zero() {
            result.duration = start.elapsed();
        }
        result
    }
}
