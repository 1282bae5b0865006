//! Shared holder for the most recent health report.

use parking_lot::RwLock;
use std::sync::Arc;

use super::check::HealthCheckReport;

/// The latest published report.
///
/// Owned by the composition root and cloned into every reader. Publishing
/// swaps the whole `Arc`, so readers see either the previous report or the
/// new one, never a partially built one.
#[derive(Clone, Default)]
pub struct HealthReportState {
    current: Arc<RwLock<Option<Arc<HealthCheckReport>>>>,
}

impl HealthReportState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current report, returning the one it displaced.
    pub fn publish(&self, report: HealthCheckReport) -> Option<Arc<HealthCheckReport>> {
        let report = Arc::new(report);
        self.current.write().replace(report)
    }

    pub fn current(&self) -> Option<Arc<HealthCheckReport>> {
        self.current.read().clone()
    }

    pub fn clear(&self) {
        self.current.write().take();
    }
}

impl std::fmt::Debug for HealthReportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthReportState")
            .field("published", &self.current.read().is_some())
            .finish()
    }
}
