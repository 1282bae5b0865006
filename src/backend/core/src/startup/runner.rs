//! Sequential startup task runner.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::task::{Criticality, StartupContext, StartupTask};
use crate::error::{IgniteError, Result};
use crate::telemetry::StartupMetrics;

/// How an executed task ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "message", rename_all = "lowercase")]
pub enum TaskOutcome {
    Completed,
    /// An optional task failed; the message describes the failure
    Warned(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub name: String,
    pub outcome: TaskOutcome,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

/// Outcome of a successful startup pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupSummary {
    pub correlation_id: Uuid,
    /// Executed tasks, in execution order
    pub tasks: Vec<TaskRecord>,
    #[serde(with = "humantime_serde")]
    pub total_duration: Duration,
}

impl StartupSummary {
    /// Names of executed tasks, in execution order.
    pub fn executed(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &TaskRecord> {
        self.tasks
            .iter()
            .filter(|t| matches!(t.outcome, TaskOutcome::Warned(_)))
    }
}

/// Runs registered startup tasks one after another in ascending order.
#[derive(Default, Clone)]
pub struct StartupTaskRunner {
    tasks: Vec<Arc<dyn StartupTask>>,
}

impl StartupTaskRunner {
    pub fn new(tasks: Vec<Arc<dyn StartupTask>>) -> Self {
        Self { tasks }
    }

    pub fn with_task(mut self, task: Arc<dyn StartupTask>) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn add(&mut self, task: Arc<dyn StartupTask>) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in execution order. Ties keep registration order.
    pub fn ordered(&self) -> Vec<Arc<dyn StartupTask>> {
        let mut tasks = self.tasks.clone();
        tasks.sort_by_key(|task| task.order());
        tasks
    }

    /// Execute every task.
    ///
    /// A required task's failure stops the pass and is returned as
    /// `TaskFailed`; an optional task's failure is recorded as a warning.
    /// Cancellation stops the pass with `StartupCancelled`.
    pub async fn run(&self, ctx: &StartupContext) -> Result<StartupSummary> {
        let tasks = self.ordered();
        let total = tasks.len();
        let cancel = ctx.cancellation();
        let started = Instant::now();
        let mut records = Vec::with_capacity(total);

        info!(
            correlation_id = %ctx.correlation_id(),
            tasks = total,
            "Starting startup sequence"
        );

        for (index, task) in tasks.iter().enumerate() {
            let name = task.name().to_string();

            if cancel.is_cancelled() {
                warn!(task = %name, "Startup cancelled before task");
                return Err(IgniteError::cancelled(name));
            }

            let percent = (index * 100 / total) as u8;
            ctx.progress().report(percent, &format!("Running {}", name));

            let span = info_span!(
                "startup_task",
                task = %name,
                order = task.order(),
                criticality = %task.criticality(),
                correlation_id = %ctx.correlation_id(),
            );

            let task_start = Instant::now();
            let result = async {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(IgniteError::cancelled(name.clone())),
                    result = task.execute(ctx, cancel) => result,
                }
            }
            .instrument(span)
            .await;
            let duration = task_start.elapsed();
            let secs = duration.as_secs_f64();

            match result {
                Ok(()) => {
                    info!(task = %name, duration_ms = duration.as_millis() as u64, "Startup task completed");
                    StartupMetrics::record_task(&name, "completed", secs);
                    records.push(TaskRecord {
                        name,
                        outcome: TaskOutcome::Completed,
                        duration,
                    });
                }
                Err(e) if e.is_cancelled() => {
                    warn!(task = %name, "Startup cancelled during task");
                    StartupMetrics::record_task(&name, "cancelled", secs);
                    return Err(e);
                }
                Err(e) => match task.criticality() {
                    Criticality::Required => {
                        error!(
                            task = %name,
                            error = %e,
                            duration_ms = duration.as_millis() as u64,
                            "Required startup task failed; aborting startup"
                        );
                        StartupMetrics::record_task(&name, "failed", secs);
                        return Err(IgniteError::task_failed(name, e));
                    }
                    Criticality::Optional => {
                        warn!(
                            task = %name,
                            error = %e,
                            duration_ms = duration.as_millis() as u64,
                            "Optional startup task failed; continuing"
                        );
                        StartupMetrics::record_task(&name, "warned", secs);
                        records.push(TaskRecord {
                            name,
                            outcome: TaskOutcome::Warned(e.message().to_string()),
                            duration,
                        });
                    }
                },
            }
        }

        ctx.progress().report(100, "Startup complete");

        let summary = StartupSummary {
            correlation_id: ctx.correlation_id(),
            tasks: records,
            total_duration: started.elapsed(),
        };
        info!(
            correlation_id = %summary.correlation_id,
            tasks = summary.tasks.len(),
            warnings = summary.warnings().count(),
            duration_ms = summary.total_duration.as_millis() as u64,
            "Startup sequence complete"
        );
        Ok(summary)
    }
}
