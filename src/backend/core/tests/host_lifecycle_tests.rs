//! Integration tests for the application host and the bootstrapper.
//!
//! Tests cover:
//! - Exit signalled exactly once from window close and repeated stops
//! - Background initialization timeout is not fatal
//! - Window creation failures reported once
//! - Loading surface closed on first render or after the fallback
//! - End-to-end bootstrap: success, required task failure, missing service

use ignite_core::bootstrap::Bootstrapper;
use ignite_core::config::{Config, HostConfig};
use ignite_core::error::{ErrorCode, IgniteError, Result};
use ignite_core::health::{FnProbe, HealthCheckResult, HealthStatus};
use ignite_core::host::{
    ApplicationHostLifecycle, ErrorReporter, ExitHook, HeadlessShell, Latch, LifecycleState,
    ThreadUiExecutor, UiExecutorExt, UiShell,
};
use ignite_core::services::{Capability, ServiceRegistry};
use ignite_core::startup::FnTask;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Helpers
// ============================================================================

#[derive(Debug, Default)]
struct ShellLog {
    window_open: bool,
    windows_created: u32,
    loading_closed: bool,
    window_checks: u32,
}

/// A shell that mirrors its state into a log the test can inspect.
struct RecordingShell {
    log: Arc<Mutex<ShellLog>>,
    fail_create: bool,
    exit_hook: Option<ExitHook>,
    /// Holds the first window check until the test releases it.
    gate: Option<std::sync::mpsc::Receiver<()>>,
}

impl UiShell for RecordingShell {
    fn has_primary_window(&self) -> bool {
        let first = {
            let mut log = self.log.lock();
            log.window_checks += 1;
            log.window_checks == 1
        };
        if first {
            if let Some(gate) = &self.gate {
                let _ = gate.recv();
            }
        }
        self.log.lock().window_open
    }

    fn create_primary_window(&mut self) -> Result<()> {
        if self.fail_create {
            return Err(IgniteError::internal("no display"));
        }
        let mut log = self.log.lock();
        log.window_open = true;
        log.windows_created += 1;
        Ok(())
    }

    fn close_primary_window(&mut self) {
        let was_open = std::mem::replace(&mut self.log.lock().window_open, false);
        if was_open {
            if let Some(hook) = self.exit_hook.take() {
                hook();
            }
        }
    }

    fn close_loading_surface(&mut self) {
        self.log.lock().loading_closed = true;
    }

    fn set_exit_hook(&mut self, hook: ExitHook) {
        self.exit_hook = Some(hook);
    }
}

#[derive(Default)]
struct RecordingReporter(Mutex<Vec<(ErrorCode, Uuid)>>);

impl ErrorReporter for RecordingReporter {
    fn report(&self, error: &IgniteError, correlation_id: Uuid) {
        self.0.lock().push((error.code(), correlation_id));
    }
}

struct Harness {
    host: Arc<ApplicationHostLifecycle>,
    ui: Arc<ThreadUiExecutor>,
    log: Arc<Mutex<ShellLog>>,
    reporter: Arc<RecordingReporter>,
}

fn harness(config: HostConfig, fail_create: bool) -> Harness {
    gated_harness(config, fail_create, None)
}

fn gated_harness(
    config: HostConfig,
    fail_create: bool,
    gate: Option<std::sync::mpsc::Receiver<()>>,
) -> Harness {
    let log = Arc::new(Mutex::new(ShellLog::default()));
    let shell_log = log.clone();
    let ui = Arc::new(
        ThreadUiExecutor::spawn(move || RecordingShell {
            log: shell_log,
            fail_create,
            exit_hook: None,
            gate,
        })
        .unwrap(),
    );
    let reporter = Arc::new(RecordingReporter::default());
    let host = ApplicationHostLifecycle::new(config, ui.clone()).with_reporter(reporter.clone());

    Harness {
        host: Arc::new(host),
        ui,
        log,
        reporter,
    }
}

fn quick_config() -> HostConfig {
    HostConfig {
        background_init_timeout: Duration::from_millis(500),
        loading_fallback_timeout: Duration::from_secs(10),
    }
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {}", what);
}

fn spawn_start(host: &Arc<ApplicationHostLifecycle>) -> tokio::task::JoinHandle<Result<()>> {
    let host = host.clone();
    tokio::spawn(async move { host.start().await })
}

// ============================================================================
// Exit Signalling
// ============================================================================

#[tokio::test]
async fn test_window_close_releases_start_once() {
    let h = harness(quick_config(), false);
    h.host.background_init().complete();

    let start = spawn_start(&h.host);
    wait_until("running", || h.host.state() == LifecycleState::Running).await;
    assert_eq!(h.log.lock().windows_created, 1);

    h.ui.invoke(|shell| shell.close_primary_window()).await.unwrap();
    start.await.unwrap().unwrap();

    assert!(h.host.shutdown_token().is_cancelled());
    assert!(h.host.exit_signal().is_completed());

    h.host.stop().await;
    h.host.stop().await;
    assert!(!h.host.exit_signal().complete());
    assert_eq!(h.host.state(), LifecycleState::Stopped);
    assert!(h.reporter.0.lock().is_empty());

    h.ui.shutdown();
}

#[tokio::test]
async fn test_stop_closes_window() {
    let h = harness(quick_config(), false);
    h.host.background_init().complete();

    let start = spawn_start(&h.host);
    wait_until("running", || h.host.state() == LifecycleState::Running).await;

    h.host.stop().await;
    start.await.unwrap().unwrap();

    assert!(!h.log.lock().window_open);
    assert_eq!(h.host.state(), LifecycleState::Stopped);
    h.ui.shutdown();
}

#[tokio::test]
async fn test_stop_during_window_creation_closes_window() {
    let (release, gate) = std::sync::mpsc::channel();
    let h = gated_harness(quick_config(), false, Some(gate));
    h.host.background_init().complete();

    let start = spawn_start(&h.host);
    wait_until("window check", || h.log.lock().window_checks == 1).await;

    // Queue the stop's window check behind the held one, before creation.
    let stop = {
        let host = h.host.clone();
        tokio::spawn(async move { host.stop().await })
    };
    wait_until("exit signalled", || h.host.exit_signal().is_completed()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    release.send(()).unwrap();

    stop.await.unwrap();
    start.await.unwrap().unwrap();

    let log = h.log.lock();
    assert_eq!(log.windows_created, 1);
    assert!(!log.window_open);
    drop(log);
    assert_eq!(h.host.state(), LifecycleState::Stopped);
    h.ui.shutdown();
}

#[tokio::test]
async fn test_exit_during_background_init_skips_window() {
    let h = harness(
        HostConfig {
            background_init_timeout: Duration::from_millis(100),
            loading_fallback_timeout: Duration::from_secs(10),
        },
        false,
    );

    let start = spawn_start(&h.host);
    wait_until("awaiting init", || {
        h.host.state() == LifecycleState::AwaitingBackgroundInit
    })
    .await;

    h.host.stop().await;
    start.await.unwrap().unwrap();

    assert_eq!(h.log.lock().windows_created, 0);
    h.ui.shutdown();
}

// ============================================================================
// Startup Failures
// ============================================================================

#[tokio::test]
async fn test_background_init_timeout_is_not_fatal() {
    let h = harness(
        HostConfig {
            background_init_timeout: Duration::from_millis(50),
            loading_fallback_timeout: Duration::from_secs(10),
        },
        false,
    );

    let start = spawn_start(&h.host);
    wait_until("running", || h.host.state() == LifecycleState::Running).await;
    assert!(!h.host.background_init().is_completed());
    assert_eq!(h.log.lock().windows_created, 1);

    h.host.stop().await;
    start.await.unwrap().unwrap();
    h.ui.shutdown();
}

#[tokio::test]
async fn test_window_creation_failure_reported_once() {
    let h = harness(quick_config(), true);
    h.host.background_init().complete();

    let err = h.host.start().await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::WindowCreationFailed);
    let reports = h.reporter.0.lock();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, ErrorCode::WindowCreationFailed);
    drop(reports);

    h.ui.shutdown();
}

// ============================================================================
// Loading Surface
// ============================================================================

#[tokio::test]
async fn test_loading_closed_on_first_render() {
    let h = harness(quick_config(), false);
    h.host.background_init().complete();

    let start = spawn_start(&h.host);
    wait_until("running", || h.host.state() == LifecycleState::Running).await;
    assert!(!h.log.lock().loading_closed);

    h.host.content_rendered().complete();
    wait_until("loading closed", || h.log.lock().loading_closed).await;

    h.host.stop().await;
    start.await.unwrap().unwrap();
    h.ui.shutdown();
}

#[tokio::test]
async fn test_loading_closed_by_fallback() {
    let h = harness(
        HostConfig {
            background_init_timeout: Duration::from_millis(500),
            loading_fallback_timeout: Duration::from_millis(50),
        },
        false,
    );
    h.host.background_init().complete();

    let start = spawn_start(&h.host);
    wait_until("loading closed", || h.log.lock().loading_closed).await;
    assert!(!h.host.content_rendered().is_completed());

    h.host.stop().await;
    start.await.unwrap().unwrap();
    h.ui.shutdown();
}

// ============================================================================
// Bootstrapper
// ============================================================================

fn bootstrap_config() -> Config {
    let mut config = Config::default();
    config.host = HostConfig {
        background_init_timeout: Duration::from_secs(5),
        loading_fallback_timeout: Duration::from_millis(50),
    };
    config.health.max_retries = 0;
    config
}

#[derive(Debug)]
struct Database;

#[tokio::test]
async fn test_bootstrap_runs_to_completion() {
    let ui = Arc::new(ThreadUiExecutor::spawn(HeadlessShell::new).unwrap());
    let mut services = ServiceRegistry::new();
    services.add_instance(Database);

    let ready = Latch::new();
    let signal = ready.clone();
    let bootstrapper = Bootstrapper::new(bootstrap_config(), services, ui.clone())
        .with_required(Capability::of::<Database>())
        .with_probe(Arc::new(FnProbe::new("Database", || async {
            Ok(HealthCheckResult::healthy("Database"))
        })))
        .with_task(Arc::new(FnTask::new("load", 10, || async { Ok(()) })))
        .with_task(Arc::new(FnTask::new("ready", 500, move || {
            let signal = signal.clone();
            async move {
                signal.complete();
                Ok(())
            }
        })));
    let shutdown = bootstrapper.shutdown_token().clone();

    let run = tokio::spawn(bootstrapper.run());
    assert!(ready.wait_timeout(Duration::from_secs(5)).await);
    shutdown.cancel();

    let outcome = run.await.unwrap().unwrap();
    let summary = outcome.summary.unwrap();
    assert_eq!(summary.executed(), vec!["load", "health-checks", "ready"]);
    let report = outcome.report.unwrap();
    assert_eq!(report.overall_status, HealthStatus::Healthy);

    ui.shutdown();
}

#[tokio::test]
async fn test_bootstrap_required_failure_shuts_down() {
    let ui = Arc::new(ThreadUiExecutor::spawn(HeadlessShell::new).unwrap());
    let reporter = Arc::new(RecordingReporter::default());

    let bootstrapper = Bootstrapper::new(bootstrap_config(), ServiceRegistry::new(), ui.clone())
        .with_reporter(reporter.clone())
        .with_task(Arc::new(FnTask::new("migrate", 10, || async {
            Err(IgniteError::internal("schema mismatch"))
        })));

    let err = tokio::time::timeout(Duration::from_secs(5), bootstrapper.run())
        .await
        .unwrap()
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::TaskFailed);
    let reports = reporter.0.lock();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, ErrorCode::TaskFailed);
    drop(reports);

    ui.shutdown();
}

#[tokio::test]
async fn test_bootstrap_rejects_missing_service() {
    let ui = Arc::new(ThreadUiExecutor::spawn(HeadlessShell::new).unwrap());
    let reporter = Arc::new(RecordingReporter::default());
    let ran = Latch::new();
    let flag = ran.clone();

    let err = Bootstrapper::new(bootstrap_config(), ServiceRegistry::new(), ui.clone())
        .with_reporter(reporter.clone())
        .with_required(Capability::of::<Database>())
        .with_task(Arc::new(FnTask::new("never", 1, move || {
            flag.complete();
            async { Ok(()) }
        })))
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::ServiceNotRegistered);
    assert_eq!(reporter.0.lock().len(), 1);
    assert!(!ran.is_completed());

    ui.shutdown();
}
