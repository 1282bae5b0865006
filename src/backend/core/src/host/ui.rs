//! UI-thread affinity.
//!
//! The windowing shell is owned by exactly one dedicated thread. Everything
//! else reaches it by submitting a job through a [`UiExecutor`] and awaiting
//! completion, so host logic never touches window objects directly.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::error::{ErrorCode, IgniteError, Result};

/// Callback fired once when the primary window closes.
pub type ExitHook = Box<dyn FnOnce() + Send>;

/// A unit of work executed on the UI thread.
pub type UiJob = Box<dyn FnOnce(&mut dyn UiShell) + Send>;

/// The windowing shell. Only ever called on the UI thread.
pub trait UiShell {
    fn has_primary_window(&self) -> bool;

    fn create_primary_window(&mut self) -> Result<()>;

    /// Close the primary window. Closing fires the registered exit hook.
    fn close_primary_window(&mut self);

    fn close_loading_surface(&mut self);

    /// Register the hook fired when the primary window closes. Replaces any
    /// previous hook.
    fn set_exit_hook(&mut self, hook: ExitHook);
}

/// Dispatches jobs onto the UI thread.
pub trait UiExecutor: Send + Sync {
    /// Queue `job`. Fails when the UI thread is gone.
    fn submit(&self, job: UiJob) -> Result<()>;
}

/// Round-trip helpers over [`UiExecutor`].
#[async_trait]
pub trait UiExecutorExt {
    /// Run `f` on the UI thread and await its result.
    async fn invoke<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn UiShell) -> R + Send + 'static,
        R: Send + 'static;
}

#[async_trait]
impl<E: UiExecutor + ?Sized> UiExecutorExt for E {
    async fn invoke<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn UiShell) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(Box::new(move |shell: &mut dyn UiShell| {
            let _ = tx.send(f(shell));
        }))?;
        rx.await.map_err(|_| {
            IgniteError::new(
                ErrorCode::UiDispatchFailed,
                "UI job did not complete",
            )
        })
    }
}

/// Runs a shell on a dedicated `ui` thread fed by an unbounded queue.
pub struct ThreadUiExecutor {
    tx: Mutex<Option<mpsc::UnboundedSender<UiJob>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadUiExecutor {
    /// Start the UI thread. `factory` builds the shell on that thread.
    pub fn spawn<F, S>(factory: F) -> Result<Self>
    where
        F: FnOnce() -> S + Send + 'static,
        S: UiShell + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<UiJob>();

        let thread = std::thread::Builder::new()
            .name("ui".to_string())
            .spawn(move || {
                let mut shell = factory();
                debug!("UI thread started");
                while let Some(job) = rx.blocking_recv() {
                    let view: &mut dyn UiShell = &mut shell;
                    if std::panic::catch_unwind(AssertUnwindSafe(|| job(view))).is_err() {
                        error!("UI job panicked");
                    }
                }
                debug!("UI thread stopped");
            })
            .map_err(|e| IgniteError::ui_unavailable(e.to_string()).with_source(e))?;

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Stop accepting jobs, drain the queue and join the UI thread.
    pub fn shutdown(&self) {
        self.tx.lock().take();
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                error!("UI thread panicked");
            } else {
                info!("UI thread joined");
            }
        }
    }
}

impl UiExecutor for ThreadUiExecutor {
    fn submit(&self, job: UiJob) -> Result<()> {
        let guard = self.tx.lock();
        let tx = guard
            .as_ref()
            .ok_or_else(|| IgniteError::ui_unavailable("UI executor shut down"))?;
        tx.send(job)
            .map_err(|_| IgniteError::ui_unavailable("UI thread exited"))
    }
}

impl Drop for ThreadUiExecutor {
    fn drop(&mut self) {
        // Detach rather than join; the thread exits once the queue closes.
        self.tx.get_mut().take();
    }
}

/// A windowless shell that logs what a real shell would display.
pub struct HeadlessShell {
    window_open: bool,
    loading_visible: bool,
    exit_hook: Option<ExitHook>,
}

impl HeadlessShell {
    pub fn new() -> Self {
        Self {
            window_open: false,
            loading_visible: true,
            exit_hook: None,
        }
    }

    pub fn is_loading_visible(&self) -> bool {
        self.loading_visible
    }
}

impl Default for HeadlessShell {
    fn default() -> Self {
        Self::new()
    }
}

impl UiShell for HeadlessShell {
    fn has_primary_window(&self) -> bool {
        self.window_open
    }

    fn create_primary_window(&mut self) -> Result<()> {
        self.window_open = true;
        info!("Primary window created");
        Ok(())
    }

    fn close_primary_window(&mut self) {
        if !self.window_open {
            return;
        }
        self.window_open = false;
        info!("Primary window closed");
        if let Some(hook) = self.exit_hook.take() {
            hook();
        }
    }

    fn close_loading_surface(&mut self) {
        if self.loading_visible {
            self.loading_visible = false;
            info!("Loading surface closed");
        }
    }

    fn set_exit_hook(&mut self, hook: ExitHook) {
        self.exit_hook = Some(hook);
    }
}
