//! Health probe engine.
//!
//! Probes run concurrently under a timeout / retry / circuit-breaker policy;
//! their results are aggregated into a [`HealthCheckReport`] that gates
//! application startup through [`HealthProbeEngine::can_start`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ignite_core::config::{Environment, HealthCheckConfiguration};
//! use ignite_core::health::{HealthProbeEngine, HealthReportState, TcpProbe};
//!
//! let engine = HealthProbeEngine::new(
//!     HealthCheckConfiguration::default(),
//!     Environment::Production,
//!     HealthReportState::new(),
//! );
//! let probes: Vec<Arc<dyn HealthProbe>> = vec![Arc::new(TcpProbe::new("Database", "localhost:5432"))];
//! let report = engine.run_all(&probes).await;
//! if !engine.can_start(&report) {
//!     // refuse to start
//! }
//! ```

mod check;
mod circuit_breaker;
mod engine;
mod policy;
mod probe;
mod probes;
mod state;

pub use check::*;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerMetrics, CircuitBreakerRegistry, CircuitState};
pub use engine::{AdmissionDecision, HealthProbeEngine};
pub use policy::ProbePolicy;
pub use probe::{FnProbe, HealthProbe, ProbeKind, ProbeSpec, ProbeTarget};
pub use probes::{build_probe, build_probes, HttpProbe, TcpProbe};
pub use state::HealthReportState;
