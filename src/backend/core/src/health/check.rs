//! Health check definitions and status types.
//!
//! This module provides:
//! - `HealthStatus` enum representing probe outcomes
//! - `HealthCheckResult` struct for a single probe's outcome
//! - `HealthCheckReport` struct for one aggregated health-check pass
//!
//! # Health Status Semantics
//!
//! - **Healthy**: Service is fully operational
//! - **Degraded**: Service works with reduced quality (e.g., high latency)
//! - **Unhealthy**: Service is not operational
//! - **Unavailable**: Service could not be reached or was not attempted
//!
//! At the aggregate level `Unavailable` counts as `Degraded`; per result it
//! stays distinct.
//!
//! # Example
//!
//! ```rust,ignore
//! use ignite_core::health::{HealthCheckResult, HealthCheckReport};
//!
//! let db = HealthCheckResult::healthy("Database")
//!     .with_description("Connected")
//!     .with_duration(std::time::Duration::from_millis(5));
//!
//! let report = HealthCheckReport::from_results(vec![db], std::time::Duration::from_millis(6));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

/// Name used for the synthetic result produced when the engine itself fails.
pub const HEALTH_CHECK_SYSTEM: &str = "HealthCheckSystem";

// ═══════════════════════════════════════════════════════════════════════════════
// Health Status
// ═══════════════════════════════════════════════════════════════════════════════

/// Health status of a probe or of a whole pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Service is fully operational
    Healthy,
    /// Service is operational but with degraded performance or partial functionality
    Degraded,
    /// Service is not operational
    Unhealthy,
    /// Service could not be reached, or the probe was not attempted
    Unavailable,
}

impl HealthStatus {
    /// Check if the status is healthy.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Check if the status is at least partially operational.
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }

    /// Outcomes that trigger a retry and count toward the failure rate.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Unhealthy | Self::Unavailable)
    }

    /// Combine two statuses under the aggregation rule.
    ///
    /// `Unavailable` folds into `Degraded`, so the combined status is never
    /// `Unavailable`.
    pub fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unhealthy, _) | (_, Self::Unhealthy) => Self::Unhealthy,
            (Self::Degraded | Self::Unavailable, _) | (_, Self::Degraded | Self::Unavailable) => {
                Self::Degraded
            }
            _ => Self::Healthy,
        }
    }

    /// Aggregate any number of statuses; an empty set is healthy.
    pub fn aggregate<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        statuses
            .into_iter()
            .fold(Self::Healthy, |acc, status| acc.combine(status))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
            Self::Unavailable => "unavailable",
        }
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::Healthy
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Health Check Result
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of one probe. Immutable once published in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Probe / service name
    pub service_name: String,

    /// Health status
    pub status: HealthStatus,

    /// Human-readable description of the outcome
    #[serde(default)]
    pub description: String,

    /// Error text when the probe failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Time spent producing this result
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Number of attempts made (0 when the probe was not attempted)
    #[serde(default)]
    pub attempts: u32,

    /// Whether this result stands in for a probe that did not finish in time
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,

    /// When the result was produced
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    /// Create a result with an explicit status.
    pub fn new(service_name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            service_name: service_name.into(),
            status,
            description: String::new(),
            error: None,
            duration: Duration::ZERO,
            attempts: 1,
            timed_out: false,
            checked_at: Utc::now(),
        }
    }

    pub fn healthy(service_name: impl Into<String>) -> Self {
        Self::new(service_name, HealthStatus::Healthy)
    }

    pub fn degraded(service_name: impl Into<String>) -> Self {
        Self::new(service_name, HealthStatus::Degraded)
    }

    pub fn unhealthy(service_name: impl Into<String>) -> Self {
        Self::new(service_name, HealthStatus::Unhealthy)
    }

    pub fn unavailable(service_name: impl Into<String>) -> Self {
        Self::new(service_name, HealthStatus::Unavailable)
    }

    /// Placeholder for a probe that did not finish within `limit`.
    pub fn timed_out(service_name: impl Into<String>, limit: Duration) -> Self {
        let mut result = Self::unhealthy(service_name)
            .with_description(format!("Health check timed out after {:?}", limit))
            .with_duration(limit);
        result.timed_out = true;
        result
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach error text. The status is left unchanged.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_status(mut self, status: HealthStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }

}

// ═══════════════════════════════════════════════════════════════════════════════
// Health Check Report
// ═══════════════════════════════════════════════════════════════════════════════

/// Aggregated report for one health-check pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckReport {
    /// When this report was generated
    pub timestamp: DateTime<Utc>,

    /// Overall status, derived from `results`
    pub overall_status: HealthStatus,

    /// Results in probe registration order
    pub results: Vec<HealthCheckResult>,

    /// Wall time of the whole pass
    #[serde(with = "humantime_serde")]
    pub total_duration: Duration,

    /// Summary counts
    pub summary: HealthSummary,
}

impl HealthCheckReport {
    /// Build a report; the overall status and counts derive from `results`.
    pub fn from_results(results: Vec<HealthCheckResult>, total_duration: Duration) -> Self {
        let overall_status = HealthStatus::aggregate(results.iter().map(|r| r.status));
        let summary = HealthSummary::from_results(&results);
        Self {
            timestamp: Utc::now(),
            overall_status,
            results,
            total_duration,
            summary,
        }
    }

    /// A report with no probes.
    pub fn empty() -> Self {
        Self::from_results(Vec::new(), Duration::ZERO)
    }

    pub fn is_healthy(&self) -> bool {
        self.overall_status.is_healthy()
    }

    /// Get a specific result by service name.
    pub fn get(&self, service_name: &str) -> Option<&HealthCheckResult> {
        self.results.iter().find(|r| r.service_name == service_name)
    }

    /// Results that are not healthy.
    pub fn failing(&self) -> impl Iterator<Item = &HealthCheckResult> {
        self.results.iter().filter(|r| !r.status.is_healthy())
    }

    /// Share of results that are Unhealthy or Unavailable.
    pub fn failure_rate(&self) -> f64 {
        if self.summary.total == 0 {
            return 0.0;
        }
        (self.summary.unhealthy + self.summary.unavailable) as f64 / self.summary.total as f64
    }

    /// One line per non-healthy service, suitable for a user-facing warning.
    pub fn failure_summary(&self) -> String {
        let mut out = String::new();
        for result in self.failing() {
            let _ = write!(out, "{} is {}", result.service_name, result.status);
            if !result.description.is_empty() {
                let _ = write!(out, ": {}", result.description);
            }
            if let Some(error) = &result.error {
                let _ = write!(out, " ({})", error);
            }
            out.push('\n');
        }
        out.truncate(out.trim_end().len());
        out
    }
}

impl Default for HealthCheckReport {
    fn default() -> Self {
        Self::empty()
    }
}

/// Summary counts for a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub total: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub unavailable: usize,
}

impl HealthSummary {
    fn from_results(results: &[HealthCheckResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            match result.status {
                HealthStatus::Healthy => summary.healthy += 1,
                HealthStatus::Degraded => summary.degraded += 1,
                HealthStatus::Unhealthy => summary.unhealthy += 1,
                HealthStatus::Unavailable => summary.unavailable += 1,
            }
        }
        summary
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
