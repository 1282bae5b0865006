//! Application host lifecycle.
//!
//! Bridges the UI thread's window lifecycle into the async host: waits for
//! background initialization, makes sure a primary window exists, closes the
//! loading surface once content is visible and then parks until the window
//! closes or [`ApplicationHostLifecycle::stop`] is called.
//!
//! ```text
//! NotStarted -> AwaitingBackgroundInit -> CreatingPrimaryWindow -> Running
//!            -> ExitRequested -> Stopped
//! ```

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::signal::Latch;
use super::ui::{ExitHook, UiExecutor, UiExecutorExt};
use crate::config::HostConfig;
use crate::error::{ErrorCode, IgniteError, Result};

/// Host lifecycle state. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    NotStarted,
    AwaitingBackgroundInit,
    CreatingPrimaryWindow,
    Running,
    ExitRequested,
    Stopped,
}

/// Receives fatal errors together with a correlation id.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &IgniteError, correlation_id: Uuid);
}

/// Logs fatal errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, error: &IgniteError, correlation_id: Uuid) {
        error.log();
        error!(
            correlation_id = %correlation_id,
            error_code = %error.code(),
            "Fatal error: {}",
            error.message()
        );
    }
}

#[derive(Clone)]
struct StateCell(Arc<RwLock<LifecycleState>>);

impl StateCell {
    fn get(&self) -> LifecycleState {
        *self.0.read()
    }

    /// Move forward to `next`; backwards or repeated transitions are ignored.
    fn advance(&self, next: LifecycleState) -> bool {
        let mut state = self.0.write();
        if next <= *state {
            debug!(current = ?*state, requested = ?next, "Ignoring lifecycle transition");
            return false;
        }
        debug!(from = ?*state, to = ?next, "Lifecycle transition");
        *state = next;
        true
    }
}

pub struct ApplicationHostLifecycle {
    config: HostConfig,
    ui: Arc<dyn UiExecutor>,
    reporter: Arc<dyn ErrorReporter>,
    background_init: Latch,
    content_rendered: Latch,
    exit: Latch,
    shutdown: CancellationToken,
    started: AtomicBool,
    state: StateCell,
}

impl ApplicationHostLifecycle {
    pub fn new(config: HostConfig, ui: Arc<dyn UiExecutor>) -> Self {
        Self {
            config,
            ui,
            reporter: Arc::new(TracingErrorReporter),
            background_init: Latch::new(),
            content_rendered: Latch::new(),
            exit: Latch::new(),
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
            state: StateCell(Arc::new(RwLock::new(LifecycleState::NotStarted))),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Use `token` as the host shutdown token.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    /// Completed by the composition root once background initialization ends.
    pub fn background_init(&self) -> &Latch {
        &self.background_init
    }

    /// Completed by the UI once the primary window has rendered content.
    pub fn content_rendered(&self) -> &Latch {
        &self.content_rendered
    }

    /// Completed exactly once when the host should exit.
    pub fn exit_signal(&self) -> &Latch {
        &self.exit
    }

    /// Cancelled when the primary window closes.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Run the host until exit. May be called once.
    pub async fn start(&self) -> Result<()> {
        if let Err(error) = self.prepare().await {
            let correlation_id = Uuid::new_v4();
            self.reporter.report(&error, correlation_id);
            return Err(error);
        }

        self.exit.wait().await;
        info!(state = ?self.state(), "Host exit signalled");
        Ok(())
    }

    async fn prepare(&self) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(IgniteError::new(
                ErrorCode::StartAlreadyInProgress,
                "The application host has already been started",
            ));
        }

        self.state.advance(LifecycleState::AwaitingBackgroundInit);
        let init_timeout = self.config.background_init_timeout;
        if !self.background_init.wait_timeout(init_timeout).await {
            warn!(
                timeout_ms = init_timeout.as_millis() as u64,
                "Background initialization did not finish in time; continuing"
            );
        }

        if self.exit.is_completed() {
            info!("Exit requested during background initialization; skipping window creation");
            return Ok(());
        }

        self.state.advance(LifecycleState::CreatingPrimaryWindow);
        let has_window = self.ui.invoke(|shell| shell.has_primary_window()).await?;
        if !has_window {
            self.ui
                .invoke(|shell| shell.create_primary_window())
                .await?
                .map_err(|e| {
                    IgniteError::new(ErrorCode::WindowCreationFailed, "Failed to create the primary window")
                        .with_source(e)
                })?;
        }

        self.spawn_loading_close();

        let hook = self.exit_hook();
        self.ui.invoke(move |shell| shell.set_exit_hook(hook)).await?;

        // `stop` may have found no window while this one was being created.
        if self.exit.is_completed() {
            info!("Exit requested while the primary window was being created; closing it");
            if let Err(e) = self.ui.invoke(|shell| shell.close_primary_window()).await {
                warn!(error = %e, "Failed to close primary window");
            }
            return Ok(());
        }

        self.state.advance(LifecycleState::Running);
        info!("Application host running");
        Ok(())
    }

    /// Close the loading surface once content renders, or after the fallback
    /// timeout. Never blocks the caller.
    fn spawn_loading_close(&self) {
        let rendered = self.content_rendered.clone();
        let ui = Arc::clone(&self.ui);
        let fallback = self.config.loading_fallback_timeout;

        tokio::spawn(async move {
            if !rendered.wait_timeout(fallback).await {
                debug!(
                    timeout_ms = fallback.as_millis() as u64,
                    "Content not rendered before fallback; closing loading surface"
                );
            }
            if let Err(e) = ui.invoke(|shell| shell.close_loading_surface()).await {
                warn!(error = %e, "Failed to close loading surface");
            }
        });
    }

    fn exit_hook(&self) -> ExitHook {
        let exit = self.exit.clone();
        let shutdown = self.shutdown.clone();
        let state = self.state.clone();
        Box::new(move || {
            state.advance(LifecycleState::ExitRequested);
            if exit.complete() {
                info!("Primary window closed; exit requested");
            }
            shutdown.cancel();
        })
    }

    /// Close the primary window if it is open and release `start`.
    pub async fn stop(&self) {
        // Signal first so a window created concurrently by `start` sees it.
        self.state.advance(LifecycleState::ExitRequested);
        self.exit.complete();

        match self.ui.invoke(|shell| shell.has_primary_window()).await {
            Ok(true) => {
                if let Err(e) = self.ui.invoke(|shell| shell.close_primary_window()).await {
                    warn!(error = %e, "Failed to close primary window");
                }
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "UI thread unavailable during stop"),
        }

        self.state.advance(LifecycleState::Stopped);
        info!("Application host stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HeadlessShell, ThreadUiExecutor};
    use std::time::Duration;

    fn host() -> (Arc<ApplicationHostLifecycle>, Arc<ThreadUiExecutor>) {
        let ui = Arc::new(ThreadUiExecutor::spawn(HeadlessShell::new).unwrap());
        let config = HostConfig {
            background_init_timeout: Duration::from_millis(200),
            loading_fallback_timeout: Duration::from_millis(50),
        };
        let host = ApplicationHostLifecycle::new(config, ui.clone());
        (Arc::new(host), ui)
    }

    #[test]
    fn test_state_only_moves_forward() {
        let cell = StateCell(Arc::new(RwLock::new(LifecycleState::NotStarted)));
        assert!(cell.advance(LifecycleState::Running));
        assert!(!cell.advance(LifecycleState::AwaitingBackgroundInit));
        assert!(!cell.advance(LifecycleState::Running));
        assert_eq!(cell.get(), LifecycleState::Running);
    }

    #[tokio::test]
    async fn test_start_creates_window_and_stop_releases() {
        let (host, ui) = host();
        host.background_init().complete();

        let runner = {
            let host = host.clone();
            tokio::spawn(async move { host.start().await })
        };

        while host.state() < LifecycleState::Running {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(ui.invoke(|shell| shell.has_primary_window()).await.unwrap());

        host.stop().await;
        runner.await.unwrap().unwrap();
        assert_eq!(host.state(), LifecycleState::Stopped);
        assert!(host.shutdown_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let (host, _ui) = host();
        host.background_init().complete();

        let first = {
            let host = host.clone();
            tokio::spawn(async move { host.start().await })
        };
        while host.state() < LifecycleState::Running {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let err = host.start().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::StartAlreadyInProgress);

        host.stop().await;
        first.await.unwrap().unwrap();
    }
}
