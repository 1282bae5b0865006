//! Ignite host - headless demo entry point.
//!
//! Runs the configured startup pipeline and health probes, then keeps a
//! headless primary "window" open until Ctrl+C or SIGTERM.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use ignite_core::{
    bootstrap::Bootstrapper,
    config::Config,
    host::{HeadlessShell, ThreadUiExecutor},
    services::{Capability, ServiceRegistry},
    startup::FnTask,
    telemetry,
};

#[derive(Parser, Debug)]
#[command(name = "ignite-host", version, about = "Ignite application host")]
struct Args {
    /// Configuration file (defaults to ./ignite.toml when present)
    #[arg(short, long, env = "IGNITE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(&path.to_string_lossy())?,
        None => Config::load()?,
    };

    let telemetry = telemetry::init_telemetry(&config.telemetry, config.environment)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        probes = config.health.probes.len(),
        "Starting Ignite host"
    );

    let ui = Arc::new(ThreadUiExecutor::spawn(HeadlessShell::new)?);

    let mut services = ServiceRegistry::new();
    services.add_instance(config.clone());

    let bootstrapper = Bootstrapper::new(config, services, ui.clone())
        .with_required(Capability::of::<Config>())
        .with_task(Arc::new(FnTask::new("load-settings", 10, || async {
            tracing::debug!("Settings loaded");
            Ok(())
        })))
        .with_task(Arc::new(
            FnTask::new("warm-caches", 50, || async {
                tracing::debug!("Caches warmed");
                Ok(())
            })
            .optional(),
        ));

    let shutdown = bootstrapper.shutdown_token().clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    let outcome = bootstrapper.run().await;

    if tokio::task::spawn_blocking(move || ui.shutdown()).await.is_err() {
        tracing::warn!("UI thread shutdown panicked");
    }

    let outcome = outcome?;
    if let Some(report) = &outcome.report {
        tracing::info!(overall = %report.overall_status, "Final health status");
    }
    telemetry.shutdown();
    tracing::info!("Ignite host shutdown complete");

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
