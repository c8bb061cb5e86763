//! Synchronization status shared between the orchestrator and its consumers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

use super::{errors::SyncError, guard::CycleGuard};

/// Result class of an executed (non-skipped) cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleKind {
    /// Every attempted domain was refreshed.
    Updated,
    /// Some domains were refreshed, the rest kept their cached values.
    Partial,
    /// No domain was refreshed.
    Failed,
}

impl CycleKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

/// Observable state of the synchronization engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// A cycle is currently executing.
    pub in_flight: bool,
    /// A user-visible (initial or manual) load is executing.
    pub loading: bool,
    /// A silent background refresh is executing.
    pub background_refresh_active: bool,
    /// Cycles in a row that refreshed no domain.
    pub consecutive_failures: u32,
    pub last_error: Option<SyncError>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<CycleKind>,
    /// Executed cycles since start. Skipped cycles are not counted.
    pub cycles: u64,
}

/// Owns the in-flight gate and publishes [`SyncState`] changes.
///
/// The gate is a single atomic flag acquired with compare-exchange. Everything else lives
/// in a `watch` channel so readers always get a consistent copy.
pub(crate) struct SyncTracker {
    in_flight: AtomicBool,
    state: watch::Sender<SyncState>,
}

impl SyncTracker {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(SyncState::default());
        Self { in_flight: AtomicBool::new(false), state }
    }

    /// Attempts to start a cycle. Returns `None` if one is already running.
    pub(crate) fn try_begin(&self, is_initial_load: bool) -> Option<CycleGuard<'_>> {
        self.in_flight.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok()?;

        self.state.send_modify(|state| {
            state.in_flight = true;
            if is_initial_load {
                state.last_error = None;
                state.loading = true;
            } else {
                state.background_refresh_active = true;
            }
        });
        Some(CycleGuard::new(self))
    }

    #[must_use]
    pub(crate) fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub(crate) fn current(&self) -> SyncState {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub(crate) fn record_success(&self, kind: CycleKind, at: DateTime<Utc>) {
        self.state.send_modify(|state| {
            state.consecutive_failures = 0;
            state.last_error = None;
            state.last_success_at = Some(at);
            state.last_outcome = Some(kind);
            state.cycles += 1;
        });
    }

    /// Records a cycle that refreshed nothing and returns the new failure streak.
    pub(crate) fn record_failure(&self, error: SyncError) -> u32 {
        let mut failures = 0;
        self.state.send_modify(|state| {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
            state.last_error = Some(error);
            state.last_outcome = Some(CycleKind::Failed);
            state.cycles += 1;
            failures = state.consecutive_failures;
        });
        failures
    }

    /// Clears the cycle flags and reopens the gate. Called from [`CycleGuard::drop`].
    pub(super) fn release(&self) {
        self.state.send_modify(|state| {
            state.in_flight = false;
            state.loading = false;
            state.background_refresh_active = false;
        });
        // Flags first: a cycle admitted right after this store must not have its
        // in_flight flag cleared by us.
        self.in_flight.store(false, Ordering::Release);
    }
}
