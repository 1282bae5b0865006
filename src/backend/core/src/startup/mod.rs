//! Ordered startup pipeline.
//!
//! Tasks run strictly one after another in ascending order. One of them is
//! usually a [`HealthCheckTask`], which turns the health report into an
//! admit / deny decision for the whole application.

mod health_task;
mod runner;
mod task;

pub use health_task::{HealthCheckTask, HealthWarningSink, TracingWarningSink};
pub use runner::{StartupSummary, StartupTaskRunner, TaskOutcome, TaskRecord};
pub use task::{
    Criticality, FnTask, ProgressReporter, StartupContext, StartupTask, TracingProgressReporter,
};
