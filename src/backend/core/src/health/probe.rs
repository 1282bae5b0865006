//! Probe contract.
//!
//! A probe is an independent health-verification unit. The engine wraps every
//! probe in a [`ProbePolicy`](super::ProbePolicy), so implementations only
//! perform a single check and never retry or time themselves out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use super::check::HealthCheckResult;
use crate::error::Result;

/// Category of a probe, used to pick its timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// Database reachability
    Database,
    /// Third-party APIs and remote services
    ExternalService,
    /// Anything else; uses the default timeout
    #[default]
    Generic,
}

/// Trait for health probes.
///
/// Returning `Err` is treated like an unhealthy outcome and retried.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// The service name reported in results.
    fn name(&self) -> &str;

    fn kind(&self) -> ProbeKind {
        ProbeKind::Generic
    }

    /// Probe-specific timeout overriding the kind-based one.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Perform one check.
    async fn check(&self) -> Result<HealthCheckResult>;
}

/// A probe backed by an async closure.
pub struct FnProbe<F> {
    name: String,
    kind: ProbeKind,
    timeout: Option<Duration>,
    check: F,
}

impl<F, Fut> FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<HealthCheckResult>> + Send,
{
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            kind: ProbeKind::Generic,
            timeout: None,
            check,
        }
    }

    pub fn with_kind(mut self, kind: ProbeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl<F, Fut> HealthProbe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<HealthCheckResult>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProbeKind {
        self.kind
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn check(&self) -> Result<HealthCheckResult> {
        (self.check)().await
    }
}

/// Declarative description of a built-in probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSpec {
    /// Service name
    pub name: String,

    /// Probe category
    #[serde(default)]
    pub kind: ProbeKind,

    /// What to probe
    pub target: ProbeTarget,

    /// Timeout override
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

/// Target of a built-in probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProbeTarget {
    /// Open a TCP connection to `address` (`host:port`)
    Tcp { address: String },
    /// Issue a GET request to `url`
    Http {
        url: String,
        #[serde(default = "default_expected_status")]
        expected_status: Vec<u16>,
    },
}

fn default_expected_status() -> Vec<u16> {
    vec![200, 204]
}
