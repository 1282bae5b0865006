//! Configuration management.
//!
//! Configuration is layered: an optional file (`ignite.toml` by default) is
//! read first and `IGNITE__*` environment variables override it. Durations are
//! written in humantime form (`"250ms"`, `"30s"`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::{IgniteError, Result};
use crate::health::{ProbeKind, ProbeSpec};
use crate::telemetry::TelemetryConfig;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,

    /// Health probe configuration
    #[serde(default)]
    pub health: HealthCheckConfiguration,

    /// Host lifecycle configuration
    #[serde(default)]
    pub host: HostConfig,

    /// Logging and metrics configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health check configuration, loaded once at boot and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfiguration {
    /// Probes that are never scheduled
    #[serde(default)]
    pub skip_services: BTreeSet<String>,

    /// Additional attempts after the first one
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between attempts, doubled after each retry
    #[serde(default = "default_retry_delay", with = "humantime_serde")]
    pub retry_delay: Duration,

    /// Per-probe fallback timeout and whole-batch deadline
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub default_timeout: Duration,

    /// Timeout for database probes
    #[serde(default = "default_database_timeout", with = "humantime_serde")]
    pub database_timeout: Duration,

    /// Timeout for external service probes
    #[serde(default = "default_external_service_timeout", with = "humantime_serde")]
    pub external_service_timeout: Duration,

    /// Services whose failure alone vetoes admission in production
    #[serde(default)]
    pub critical_services: BTreeSet<String>,

    /// Admit startup regardless of probe results
    #[serde(default)]
    pub continue_on_failure: bool,

    /// Largest tolerated share of failing probes (0.0 - 1.0)
    #[serde(default = "default_max_failure_rate")]
    pub max_failure_rate: f64,

    /// Circuit breaker settings applied per service
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Built-in probes to register
    #[serde(default)]
    pub probes: Vec<ProbeSpec>,
}

impl Default for HealthCheckConfiguration {
    fn default() -> Self {
        Self {
            skip_services: BTreeSet::new(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            default_timeout: default_timeout(),
            database_timeout: default_database_timeout(),
            external_service_timeout: default_external_service_timeout(),
            critical_services: BTreeSet::new(),
            continue_on_failure: false,
            max_failure_rate: default_max_failure_rate(),
            circuit_breaker: CircuitBreakerConfig::default(),
            probes: Vec::new(),
        }
    }
}

impl HealthCheckConfiguration {
    /// Resolve the timeout for a probe of the given kind.
    pub fn timeout_for(&self, kind: ProbeKind) -> Duration {
        match kind {
            ProbeKind::Database => self.database_timeout,
            ProbeKind::ExternalService => self.external_service_timeout,
            ProbeKind::Generic => self.default_timeout,
        }
    }

    pub fn is_skipped(&self, service: &str) -> bool {
        self.skip_services.contains(service)
    }

    pub fn is_critical(&self, service: &str) -> bool {
        self.critical_services.contains(service)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the breaker opens (0 disables the breaker)
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long an open breaker waits before a trial attempt
    #[serde(default = "default_recovery_timeout", with = "humantime_serde")]
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout: default_recovery_timeout(),
        }
    }
}

/// Host lifecycle timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Upper bound on waiting for background initialization
    #[serde(default = "default_background_init_timeout", with = "humantime_serde")]
    pub background_init_timeout: Duration,

    /// Loading surface is closed after this long even if content never renders
    #[serde(default = "default_loading_fallback_timeout", with = "humantime_serde")]
    pub loading_fallback_timeout: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            background_init_timeout: default_background_init_timeout(),
            loading_fallback_timeout: default_loading_fallback_timeout(),
        }
    }
}

// Default value functions
fn default_max_retries() -> u32 { 2 }
fn default_retry_delay() -> Duration { Duration::from_millis(500) }
fn default_timeout() -> Duration { Duration::from_secs(30) }
fn default_database_timeout() -> Duration { Duration::from_secs(10) }
fn default_external_service_timeout() -> Duration { Duration::from_secs(15) }
fn default_max_failure_rate() -> f64 { 0.5 }
fn default_failure_threshold() -> u32 { 5 }
fn default_recovery_timeout() -> Duration { Duration::from_secs(30) }
fn default_background_init_timeout() -> Duration { Duration::from_secs(30) }
fn default_loading_fallback_timeout() -> Duration { Duration::from_secs(10) }

impl Config {
    /// Load configuration from `ignite.toml` (if present) and the environment.
    pub fn load() -> Result<Self> {
        Self::build(config::File::with_name("ignite").required(false))
    }

    /// Load from a specific file path.
    pub fn from_file(path: &str) -> Result<Self> {
        Self::build(config::File::with_name(path))
    }

    fn build<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("IGNITE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("health.skip_services")
                    .with_list_parse_key("health.critical_services"),
            )
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        let health = &self.health;
        for (name, value) in [
            ("health.default_timeout", health.default_timeout),
            ("health.database_timeout", health.database_timeout),
            ("health.external_service_timeout", health.external_service_timeout),
            ("host.background_init_timeout", self.host.background_init_timeout),
            ("host.loading_fallback_timeout", self.host.loading_fallback_timeout),
        ] {
            if value.is_zero() {
                return Err(IgniteError::configuration(format!("{} must be greater than zero", name)));
            }
        }

        if !(0.0..=1.0).contains(&health.max_failure_rate) {
            return Err(IgniteError::configuration(format!(
                "health.max_failure_rate must be within [0, 1], got {}",
                health.max_failure_rate
            )));
        }

        let mut names = BTreeSet::new();
        for probe in &health.probes {
            if !names.insert(probe.name.as_str()) {
                return Err(IgniteError::configuration(format!(
                    "duplicate probe name '{}'",
                    probe.name
                )));
            }
        }

        Ok(())
    }
}
