//! Application host: UI-thread bridge and lifecycle state machine.

mod lifecycle;
mod signal;
mod ui;

pub use lifecycle::{ApplicationHostLifecycle, ErrorReporter, LifecycleState, TracingErrorReporter};
pub use signal::Latch;
pub use ui::{
    ExitHook, HeadlessShell, ThreadUiExecutor, UiExecutor, UiExecutorExt, UiJob, UiShell,
};
