//! Composition root.
//!
//! Wires the service registry, startup pipeline, health engine and host
//! together and runs them to completion:
//!
//! 1. validate required services;
//! 2. run the startup tasks on a spawned task (health checks last by default);
//! 3. start the host, whose background-init latch completes when startup ends;
//! 4. a fatal startup error is reported and shuts the host down.
//!
//! A single shutdown token links everything: closing the primary window or
//! cancelling the token from outside (e.g. Ctrl+C) stops the host and
//! abandons any startup work still in flight.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{IgniteError, Result};
use crate::health::{build_probes, HealthCheckReport, HealthProbe, HealthProbeEngine, HealthReportState};
use crate::host::{ApplicationHostLifecycle, ErrorReporter, TracingErrorReporter, UiExecutor};
use crate::services::{Capability, ServiceRegistry, ServiceRegistryValidator};
use crate::startup::{
    HealthCheckTask, HealthWarningSink, ProgressReporter, StartupContext, StartupSummary,
    StartupTask, StartupTaskRunner, TracingProgressReporter, TracingWarningSink,
};

/// What a completed run produced.
#[derive(Debug)]
pub struct BootstrapOutcome {
    /// `None` when startup was abandoned because the host exited first
    pub summary: Option<StartupSummary>,
    /// Latest published health report
    pub report: Option<Arc<HealthCheckReport>>,
}

pub struct Bootstrapper {
    config: Config,
    services: ServiceRegistry,
    required: Vec<Capability>,
    tasks: Vec<Arc<dyn StartupTask>>,
    probes: Vec<Arc<dyn HealthProbe>>,
    ui: Arc<dyn UiExecutor>,
    reporter: Arc<dyn ErrorReporter>,
    progress: Arc<dyn ProgressReporter>,
    warning_sink: Arc<dyn HealthWarningSink>,
    health_order: i32,
    report_state: HealthReportState,
    shutdown: CancellationToken,
}

impl Bootstrapper {
    pub fn new(config: Config, services: ServiceRegistry, ui: Arc<dyn UiExecutor>) -> Self {
        Self {
            config,
            services,
            required: Vec::new(),
            tasks: Vec::new(),
            probes: Vec::new(),
            ui,
            reporter: Arc::new(TracingErrorReporter),
            progress: Arc::new(TracingProgressReporter),
            warning_sink: Arc::new(TracingWarningSink),
            health_order: HealthCheckTask::DEFAULT_ORDER,
            report_state: HealthReportState::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_required(mut self, capability: Capability) -> Self {
        self.required.push(capability);
        self
    }

    pub fn with_task(mut self, task: Arc<dyn StartupTask>) -> Self {
        self.tasks.push(task);
        self
    }

    /// Add a probe on top of those described in configuration.
    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_warning_sink(mut self, sink: Arc<dyn HealthWarningSink>) -> Self {
        self.warning_sink = sink;
        self
    }

    /// Position of the health-check task in the startup sequence.
    pub fn with_health_order(mut self, order: i32) -> Self {
        self.health_order = order;
        self
    }

    /// Shared holder of the latest health report.
    pub fn report_state(&self) -> &HealthReportState {
        &self.report_state
    }

    /// Cancel to shut the application down.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Run until the host exits.
    pub async fn run(self) -> Result<BootstrapOutcome> {
        let Self {
            config,
            services,
            required,
            tasks,
            mut probes,
            ui,
            reporter,
            progress,
            warning_sink,
            health_order,
            report_state,
            shutdown,
        } = self;

        if let Err(error) = ServiceRegistryValidator::validate(&services, &required) {
            reporter.report(&error, Uuid::new_v4());
            return Err(error);
        }

        let engine = Arc::new(HealthProbeEngine::new(
            config.health.clone(),
            config.environment,
            report_state.clone(),
        ));
        probes.extend(build_probes(&config.health.probes));

        let mut runner = StartupTaskRunner::new(tasks);
        runner.add(Arc::new(
            HealthCheckTask::new(engine, probes)
                .with_sink(warning_sink)
                .with_order(health_order),
        ));

        let host = Arc::new(
            ApplicationHostLifecycle::new(config.host.clone(), ui)
                .with_reporter(Arc::clone(&reporter))
                .with_shutdown_token(shutdown.clone()),
        );

        let stopper = {
            let host = Arc::clone(&host);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                shutdown.cancelled().await;
                host.stop().await;
            })
        };

        let ctx = StartupContext::new(Arc::new(services.create_scope()))
            .with_progress(progress)
            .with_cancellation(shutdown.child_token());
        info!(
            correlation_id = %ctx.correlation_id(),
            environment = %config.environment,
            "Bootstrapping application"
        );

        let startup = {
            let host = Arc::clone(&host);
            let reporter = Arc::clone(&reporter);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let result = runner.run(&ctx).await;
                host.background_init().complete();
                if let Err(error) = &result {
                    if !error.is_cancelled() {
                        reporter.report(error, ctx.correlation_id());
                        shutdown.cancel();
                    }
                }
                result
            })
        };

        let host_result = host.start().await;
        shutdown.cancel();

        let startup_result = startup.await.unwrap_or_else(|e| {
            Err(IgniteError::internal(format!("startup task panicked: {}", e)))
        });
        if stopper.await.is_err() {
            warn!("Host stop task panicked");
        }

        host_result?;
        let summary = match startup_result {
            Ok(summary) => Some(summary),
            Err(error) if error.is_cancelled() => {
                info!("Startup abandoned because the host exited");
                None
            }
            Err(error) => return Err(error),
        };

        Ok(BootstrapOutcome {
            summary,
            report: report_state.current(),
        })
    }
}
