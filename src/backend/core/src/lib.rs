#![allow(clippy::result_large_err)]
//! # Ignite Core
//!
//! Startup orchestration and health-probe admission engine.
//!
//! ## Architecture
//!
//! - **Startup**: ordered, sequential initialization tasks with required / optional criticality
//! - **Health**: concurrent service probes under timeout, retry and circuit-breaker policies,
//!   aggregated into a report that decides whether the application may start
//! - **Services**: type-keyed registry with scoped resolution and startup validation
//! - **Host**: bridges a single UI thread's window lifecycle into the async runtime
//! - **Telemetry**: structured logging and Prometheus metrics

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod health;
pub mod host;
pub mod services;
pub mod startup;
pub mod telemetry;

pub use error::{ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, IgniteError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bootstrap::{BootstrapOutcome, Bootstrapper};
    pub use crate::config::{Config, Environment, HealthCheckConfiguration, HostConfig};
    pub use crate::error::{ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, IgniteError, Result};
    pub use crate::health::{
        AdmissionDecision, FnProbe, HealthCheckReport, HealthCheckResult, HealthProbe,
        HealthProbeEngine, HealthReportState, HealthStatus, ProbeKind, ProbePolicy,
    };
    pub use crate::host::{
        ApplicationHostLifecycle, ErrorReporter, HeadlessShell, LifecycleState, ThreadUiExecutor,
        UiExecutor, UiExecutorExt, UiShell,
    };
    pub use crate::services::{
        Capability, ServiceRegistry, ServiceRegistryValidator, ServiceResolver, ServiceResolverExt,
    };
    pub use crate::startup::{
        Criticality, FnTask, HealthCheckTask, HealthWarningSink, ProgressReporter, StartupContext,
        StartupSummary, StartupTask, StartupTaskRunner, TaskOutcome,
    };
}
