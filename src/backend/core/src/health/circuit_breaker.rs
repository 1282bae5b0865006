//! Circuit breakers for health probes.
//!
//! A probe that keeps failing across health passes trips its breaker. While
//! the breaker is open the probe is not invoked at all and reports
//! `Unavailable`, so a dead dependency does not cost a full timeout on every
//! pass. After the recovery timeout a single trial attempt is let through.

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::telemetry::HealthMetrics;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - probes run
    Closed,
    /// Too many failures - probes skipped
    Open,
    /// Recovery trial - one probe run decides
    HalfOpen,
}

/// Circuit breaker guarding a single probe.
pub struct CircuitBreaker {
    /// Service the breaker guards
    name: String,

    /// Current state
    state: RwLock<CircuitState>,

    /// Consecutive failure count
    failure_count: AtomicU32,

    /// Failure threshold to trip the breaker
    failure_threshold: u32,

    /// Time the breaker was opened
    opened_at: RwLock<Option<Instant>>,

    /// How long to wait before a trial attempt
    recovery_timeout: Duration,

    total_successes: AtomicU64,
    total_failures: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            failure_threshold: failure_threshold.max(1),
            opened_at: RwLock::new(None),
            recovery_timeout: Duration::from_secs(30),
            total_successes: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
        }
    }

    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check whether the probe may run. Moves an expired open breaker to half-open.
    pub fn can_execute(&self) -> bool {
        let state = *self.state.read();

        match state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let expired = self
                    .opened_at
                    .read()
                    .map(|opened_at| opened_at.elapsed() >= self.recovery_timeout)
                    .unwrap_or(false);
                if expired {
                    self.transition(CircuitState::HalfOpen);
                    tracing::info!(service = %self.name, "Circuit breaker transitioning to half-open");
                }
                expired
            }
        }
    }

    pub fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);
        self.failure_count.store(0, Ordering::Relaxed);

        let current = *self.state.read();
        if current == CircuitState::HalfOpen {
            *self.opened_at.write() = None;
            self.transition(CircuitState::Closed);
            tracing::info!(service = %self.name, "Circuit breaker closed after successful recovery");
        }
    }

    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);

        // The read guard must be released before `trip` takes the write lock.
        let current = *self.state.read();
        match current {
            CircuitState::HalfOpen => {
                self.trip();
                tracing::warn!(service = %self.name, "Circuit breaker re-opened after failed recovery attempt");
            }
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
                if failures >= self.failure_threshold {
                    self.trip();
                    tracing::warn!(
                        service = %self.name,
                        failures = failures,
                        threshold = self.failure_threshold,
                        "Circuit breaker opened due to consecutive failures"
                    );
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        *self.state.read()
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            state: self.state(),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            failure_threshold: self.failure_threshold,
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
        }
    }

    /// Force the breaker closed.
    pub fn reset(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
        *self.opened_at.write() = None;
        self.transition(CircuitState::Closed);
        tracing::info!(service = %self.name, "Circuit breaker manually reset");
    }

    fn trip(&self) {
        *self.opened_at.write() = Some(Instant::now());
        self.transition(CircuitState::Open);
    }

    fn transition(&self, next: CircuitState) {
        *self.state.write() = next;
        HealthMetrics::record_breaker_state(&self.name, next);
    }
}

/// Point-in-time breaker counters.
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub total_successes: u64,
    pub total_failures: u64,
}

/// One breaker per probe, created on first use and kept across health passes.
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Breaker for `service`, or `None` when breakers are disabled.
    pub fn get(&self, service: &str) -> Option<Arc<CircuitBreaker>> {
        if self.config.failure_threshold == 0 {
            return None;
        }

        let breaker = self
            .breakers
            .entry(service.to_string())
            .or_insert_with(|| {
                Arc::new(
                    CircuitBreaker::new(service, self.config.failure_threshold)
                        .with_recovery_timeout(self.config.recovery_timeout),
                )
            })
            .clone();
        Some(breaker)
    }

    pub fn states(&self) -> Vec<(String, CircuitState)> {
        let mut states: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }
}
