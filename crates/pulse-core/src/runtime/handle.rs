//! Cloneable consumer handle onto a running engine.

use serde::Serialize;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use thiserror::Error;
use tokio::sync::watch;

use crate::{
    metrics::MetricsSummary,
    sync::{CycleKind, CycleOutcome, SchedulerState, SyncError, SyncState},
    types::Snapshot,
};

use super::PulseComponents;

/// Errors returned to handle users.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The runtime backing this handle has been shut down.
    #[error("engine has been shut down")]
    ShutDown,
}

/// Coarse health indicator derived from scheduler and sync state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// No cycle has completed yet.
    Starting,
    /// The last cycle refreshed every attempted domain.
    Healthy,
    /// The last cycle was partial, or failed while cached data is still served.
    Degraded,
    /// The last cycle failed and nothing is cached.
    Failing,
    /// Automatic refresh is paused after repeated failures.
    Paused,
}

impl HealthStatus {
    #[must_use]
    pub fn derive(scheduler: SchedulerState, sync: &SyncState, snapshot: &Snapshot) -> Self {
        if scheduler == SchedulerState::Paused {
            return Self::Paused;
        }
        match sync.last_outcome {
            None => Self::Starting,
            Some(CycleKind::Updated) => Self::Healthy,
            Some(CycleKind::Partial) => Self::Degraded,
            Some(CycleKind::Failed) if snapshot.domains().is_empty() => Self::Failing,
            Some(CycleKind::Failed) => Self::Degraded,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Failing => "failing",
            Self::Paused => "paused",
        }
    }
}

/// Read access and manual refresh for engine consumers.
///
/// Reads keep working after shutdown and return the last published values; only
/// [`refresh_now`](Self::refresh_now) is refused.
#[derive(Clone)]
pub struct PulseHandle {
    components: PulseComponents,
    shutdown_initiated: Arc<AtomicBool>,
}

impl PulseHandle {
    pub(super) fn new(components: PulseComponents, shutdown_initiated: Arc<AtomicBool>) -> Self {
        Self { components, shutdown_initiated }
    }

    /// Returns the latest merged snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.components.store().get()
    }

    /// Receives every snapshot published after subscription.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.components.store().subscribe()
    }

    /// Runs a user-visible refresh cycle now, even while automatic refresh is paused.
    ///
    /// Returns [`CycleOutcome::Skipped`] if a cycle is already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ShutDown`] once the runtime has been shut down.
    pub async fn refresh_now(&self) -> Result<CycleOutcome, EngineError> {
        if self.is_shut_down() {
            return Err(EngineError::ShutDown);
        }
        Ok(self.components.scheduler().refresh_now().await)
    }

    #[must_use]
    pub fn sync_state(&self) -> SyncState {
        self.components.aggregator().sync_state()
    }

    #[must_use]
    pub fn subscribe_sync_state(&self) -> watch::Receiver<SyncState> {
        self.components.aggregator().subscribe_sync_state()
    }

    #[must_use]
    pub fn scheduler_state(&self) -> SchedulerState {
        self.components.scheduler().state()
    }

    #[must_use]
    pub fn subscribe_scheduler_state(&self) -> watch::Receiver<SchedulerState> {
        self.components.scheduler().subscribe_state()
    }

    /// [`SyncError::SchedulerPaused`] while automatic refresh is paused, otherwise `None`.
    #[must_use]
    pub fn scheduler_error(&self) -> Option<SyncError> {
        self.components.scheduler().pause_error()
    }

    #[must_use]
    pub fn status(&self) -> HealthStatus {
        HealthStatus::derive(self.scheduler_state(), &self.sync_state(), &self.snapshot())
    }

    #[must_use]
    pub fn metrics_summary(&self) -> MetricsSummary {
        self.components.metrics_collector().summary()
    }

    /// Renders metrics in the Prometheus text format.
    #[must_use]
    pub fn render_metrics(&self) -> String {
        self.components.metrics_collector().render()
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }
}
