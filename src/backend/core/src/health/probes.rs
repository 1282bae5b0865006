//! Built-in probes for database reachability and external service availability.
//!
//! # Example
//!
//! ```rust,ignore
//! use ignite_core::health::{TcpProbe, HttpProbe};
//!
//! let db = TcpProbe::new("Database", "localhost:5432");
//! let billing = HttpProbe::new("Billing", "https://billing.example/health");
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::debug;

use super::check::HealthCheckResult;
use super::probe::{HealthProbe, ProbeKind, ProbeSpec, ProbeTarget};
use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════════════
// TCP Probe
// ═══════════════════════════════════════════════════════════════════════════════

/// Checks that a TCP endpoint accepts connections.
pub struct TcpProbe {
    name: String,
    address: String,
    kind: ProbeKind,
    timeout: Option<Duration>,
}

impl TcpProbe {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            kind: ProbeKind::Database,
            timeout: None,
        }
    }

    pub fn with_kind(mut self, kind: ProbeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl HealthProbe for TcpProbe {
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
        let start = Instant::now();
        let result = match TcpStream::connect(&self.address).await {
            Ok(_) => HealthCheckResult::healthy(&self.name)
                .with_description(format!("Connected to {}", self.address)),
            Err(e) => {
                debug!(probe = %self.name, address = %self.address, error = %e, "TCP connect failed");
                HealthCheckResult::unhealthy(&self.name)
                    .with_description(format!("Cannot connect to {}", self.address))
                    .with_error(e.to_string())
            }
        };
        Ok(result.with_duration(start.elapsed()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HTTP Probe
// ═══════════════════════════════════════════════════════════════════════════════

/// Checks an HTTP health endpoint.
///
/// Expected status -> Healthy, 5xx -> Unhealthy, any other status -> Degraded,
/// transport failure -> Unavailable.
pub struct HttpProbe {
    client: reqwest::Client,
    name: String,
    url: String,
    expected_status: Vec<u16>,
    kind: ProbeKind,
    timeout: Option<Duration>,
}

impl HttpProbe {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            name: name.into(),
            url: url.into(),
            expected_status: vec![200, 204],
            kind: ProbeKind::ExternalService,
            timeout: None,
        }
    }

    pub fn with_expected_status(mut self, codes: Vec<u16>) -> Self {
        self.expected_status = codes;
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_kind(mut self, kind: ProbeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn classify(&self, status: u16) -> HealthCheckResult {
        if self.expected_status.contains(&status) {
            HealthCheckResult::healthy(&self.name)
                .with_description(format!("{} is reachable", self.url))
        } else if (500..600).contains(&status) {
            HealthCheckResult::unhealthy(&self.name)
                .with_description(format!("Server error: {}", status))
        } else {
            HealthCheckResult::degraded(&self.name).with_description(format!(
                "Unexpected status: {} (expected {:?})",
                status, self.expected_status
            ))
        }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
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
        let start = Instant::now();
        let result = match self.client.get(&self.url).send().await {
            Ok(response) => self.classify(response.status().as_u16()),
            Err(e) => {
                debug!(probe = %self.name, url = %self.url, error = %e, "HTTP probe request failed");
                HealthCheckResult::unavailable(&self.name)
                    .with_description(format!("{} is unreachable", self.url))
                    .with_error(e.to_string())
            }
        };
        Ok(result.with_duration(start.elapsed()))
    }
}

/// Build a probe from its declarative description.
pub fn build_probe(spec: &ProbeSpec) -> Arc<dyn HealthProbe> {
    match &spec.target {
        ProbeTarget::Tcp { address } => Arc::new(
            TcpProbe::new(&spec.name, address)
                .with_kind(spec.kind)
                .with_timeout(spec.timeout),
        ),
        ProbeTarget::Http { url, expected_status } => Arc::new(
            HttpProbe::new(&spec.name, url)
                .with_expected_status(expected_status.clone())
                .with_kind(spec.kind)
                .with_timeout(spec.timeout),
        ),
    }
}

/// Build every configured probe, in configuration order.
pub fn build_probes(specs: &[ProbeSpec]) -> Vec<Arc<dyn HealthProbe>> {
    specs.iter().map(build_probe).collect()
}
