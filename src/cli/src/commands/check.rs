//! Health check command.
//!
//! Runs the probes declared under `[[health.probes]]` through the same engine
//! and admission gate the host uses, and exits non-zero when startup would be
//! denied.

use anyhow::{bail, Result};
use chrono::SecondsFormat;
use clap::{Args, ValueEnum};
use ignite_core::config::Environment;
use ignite_core::health::{
    build_probes, AdmissionDecision, HealthCheckReport, HealthCheckResult, HealthProbeEngine,
    HealthReportState,
};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct CheckArgs {
    /// Evaluate admission as if running in this environment
    #[arg(short, long)]
    environment: Option<EnvironmentArg>,

    /// Skip a probe by name (repeatable)
    #[arg(long = "skip", value_name = "NAME")]
    skip: Vec<String>,

    /// Treat a probe as critical (repeatable)
    #[arg(long = "critical", value_name = "NAME")]
    critical: Vec<String>,

    /// Report failures but always admit
    #[arg(long)]
    continue_on_failure: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EnvironmentArg {
    Development,
    Staging,
    Production,
}

impl From<EnvironmentArg> for Environment {
    fn from(arg: EnvironmentArg) -> Self {
        match arg {
            EnvironmentArg::Development => Environment::Development,
            EnvironmentArg::Staging => Environment::Staging,
            EnvironmentArg::Production => Environment::Production,
        }
    }
}

#[derive(Debug, Tabled)]
struct ResultRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Attempts")]
    attempts: u32,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Details")]
    details: String,
}

impl From<&HealthCheckResult> for ResultRow {
    fn from(result: &HealthCheckResult) -> Self {
        let details = match &result.error {
            Some(error) if result.description.is_empty() => error.clone(),
            Some(error) => format!("{} ({})", result.description, error),
            None => result.description.clone(),
        };
        Self {
            service: result.service_name.clone(),
            status: output::status_label(result.status),
            attempts: result.attempts,
            duration: format!("{}ms", result.duration.as_millis()),
            details,
        }
    }
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    environment: Environment,
    report: &'a HealthCheckReport,
    admission: &'a AdmissionDecision,
}

pub async fn execute(args: CheckArgs, config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let mut config = super::config::load(config_path)?;
    if let Some(environment) = args.environment {
        config.environment = environment.into();
    }
    config.health.skip_services.extend(args.skip);
    config.health.critical_services.extend(args.critical);
    config.health.continue_on_failure |= args.continue_on_failure;

    let probes = build_probes(&config.health.probes);
    if probes.is_empty() {
        output::print_info("No health probes configured.");
        return Ok(());
    }

    let spinner = matches!(format, OutputFormat::Table).then(|| {
        output::spinner(format!(
            "Running {} health probe(s) for {}",
            probes.len(),
            config.environment
        ))
    });

    let engine = HealthProbeEngine::new(
        config.health.clone(),
        config.environment,
        HealthReportState::new(),
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let report = engine.run_all_with_cancel(&probes, &cancel).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let admission = engine.admission(&report);

    match format {
        OutputFormat::Table => print_report(&report, &admission),
        _ => output::print_item(
            &CheckOutput {
                environment: config.environment,
                report: &report,
                admission: &admission,
            },
            format,
        )?,
    }

    if cancel.is_cancelled() {
        bail!("Health check interrupted");
    }
    if !admission.allowed {
        bail!("Startup would be denied: {}", admission.reason);
    }
    Ok(())
}

fn print_report(report: &HealthCheckReport, admission: &AdmissionDecision) {
    let rows: Vec<ResultRow> = report.results.iter().map(ResultRow::from).collect();
    output::print_table(&rows);

    output::print_header("Summary");
    output::print_detail("Overall", &output::status_label(report.overall_status));
    output::print_detail(
        "Counts",
        &format!(
            "{} healthy, {} degraded, {} unhealthy, {} unavailable",
            report.summary.healthy,
            report.summary.degraded,
            report.summary.unhealthy,
            report.summary.unavailable
        ),
    );
    output::print_detail("Failure rate", &format!("{:.0}%", report.failure_rate() * 100.0));
    output::print_detail("Duration", &format!("{}ms", report.total_duration.as_millis()));
    output::print_detail(
        "Checked at",
        &report.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
    );
    println!();

    if admission.allowed {
        if report.failing().next().is_some() {
            output::print_warning(&format!("Startup admitted: {}", admission.reason));
        } else {
            output::print_success(&format!("Startup admitted: {}", admission.reason));
        }
    }
}
