//! Startup task contract and the per-run context handed to every task.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::Result;
use crate::services::ServiceResolver;

/// Whether a task's failure aborts startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    /// Failure aborts startup
    #[default]
    Required,
    /// Failure is logged as a warning and startup continues
    Optional,
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("required"),
            Self::Optional => f.write_str("optional"),
        }
    }
}

/// A unit of initialization work.
///
/// Tasks run one at a time, in ascending [`order`](StartupTask::order).
/// Long-running tasks should watch `cancel` and return early when it fires.
#[async_trait]
pub trait StartupTask: Send + Sync {
    fn name(&self) -> &str;

    /// Position in the startup sequence; lower runs first.
    fn order(&self) -> i32;

    fn criticality(&self) -> Criticality {
        Criticality::Required
    }

    async fn execute(&self, ctx: &StartupContext, cancel: &CancellationToken) -> Result<()>;
}

/// Receives startup progress.
pub trait ProgressReporter: Send + Sync {
    /// `percent` is in `0..=100`.
    fn report(&self, percent: u8, message: &str);
}

/// Logs progress as tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressReporter;

impl ProgressReporter for TracingProgressReporter {
    fn report(&self, percent: u8, message: &str) {
        tracing::info!(percent = percent, "{}", message);
    }
}

/// Everything a task needs for one startup pass.
#[derive(Clone)]
pub struct StartupContext {
    progress: Arc<dyn ProgressReporter>,
    cancellation: CancellationToken,
    services: Arc<dyn ServiceResolver>,
    correlation_id: Uuid,
}

impl StartupContext {
    pub fn new(services: Arc<dyn ServiceResolver>) -> Self {
        Self {
            progress: Arc::new(TracingProgressReporter),
            cancellation: CancellationToken::new(),
            services,
            correlation_id: Uuid::new_v4(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn progress(&self) -> &dyn ProgressReporter {
        self.progress.as_ref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Scoped resolver for this pass.
    pub fn services(&self) -> &dyn ServiceResolver {
        self.services.as_ref()
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl fmt::Debug for StartupContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartupContext")
            .field("correlation_id", &self.correlation_id)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

/// A task backed by an async closure that needs no context.
pub struct FnTask<F> {
    name: String,
    order: i32,
    criticality: Criticality,
    run: F,
}

impl<F, Fut> FnTask<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    pub fn new(name: impl Into<String>, order: i32, run: F) -> Self {
        Self {
            name: name.into(),
            order,
            criticality: Criticality::Required,
            run,
        }
    }

    pub fn optional(mut self) -> Self {
        self.criticality = Criticality::Optional;
        self
    }
}

#[async_trait]
impl<F, Fut> StartupTask for FnTask<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn criticality(&self) -> Criticality {
        self.criticality
    }

    async fn execute(&self, _ctx: &StartupContext, _cancel: &CancellationToken) -> Result<()> {
        (self.run)().await
    }
}
