//! Startup task that runs the health probes and enforces the admission gate.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::task::{Criticality, StartupContext, StartupTask};
use crate::error::{IgniteError, Result};
use crate::health::{HealthCheckReport, HealthProbe, HealthProbeEngine};

/// Receives the warning shown when startup is admitted despite failing probes.
pub trait HealthWarningSink: Send + Sync {
    fn warn(&self, report: &HealthCheckReport, summary: &str);
}

/// Logs the warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWarningSink;

impl HealthWarningSink for TracingWarningSink {
    fn warn(&self, report: &HealthCheckReport, summary: &str) {
        warn!(
            overall = %report.overall_status,
            failing = report.failing().count(),
            "Some services are not healthy; the application may have limited functionality:\n{}",
            summary
        );
    }
}

pub struct HealthCheckTask {
    engine: Arc<HealthProbeEngine>,
    probes: Vec<Arc<dyn HealthProbe>>,
    sink: Arc<dyn HealthWarningSink>,
    order: i32,
}

impl HealthCheckTask {
    pub const DEFAULT_ORDER: i32 = 100;

    pub fn new(engine: Arc<HealthProbeEngine>, probes: Vec<Arc<dyn HealthProbe>>) -> Self {
        Self {
            engine,
            probes,
            sink: Arc::new(TracingWarningSink),
            order: Self::DEFAULT_ORDER,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn HealthWarningSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

#[async_trait]
impl StartupTask for HealthCheckTask {
    fn name(&self) -> &str {
        "health-checks"
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn criticality(&self) -> Criticality {
        Criticality::Required
    }

    async fn execute(&self, ctx: &StartupContext, cancel: &CancellationToken) -> Result<()> {
        debug!(
            probes = self.probes.len(),
            correlation_id = %ctx.correlation_id(),
            "Running startup health checks"
        );

        let report = self.engine.run_all_with_cancel(&self.probes, cancel).await;
        if cancel.is_cancelled() {
            return Err(IgniteError::cancelled("health checks"));
        }

        let decision = self.engine.admission(&report);
        let summary = report.failure_summary();

        if !decision.allowed {
            let message = if summary.is_empty() {
                decision.reason
            } else {
                format!("{}\n{}", decision.reason, summary)
            };
            return Err(IgniteError::admission_denied(message)
                .with_context("overall_status", report.overall_status.as_str())
                .with_context("failure_rate", report.failure_rate()));
        }

        if !summary.is_empty() {
            self.sink.warn(&report, &summary);
        }

        info!(
            overall = %report.overall_status,
            reason = %decision.reason,
            "Health admission granted"
        );
        Ok(())
    }
}
