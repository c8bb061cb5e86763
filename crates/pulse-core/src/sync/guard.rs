//! `CycleGuard` RAII type for the orchestrator's in-flight gate.
//!
//! The guard is created by `SyncTracker::try_begin()` once the compare-exchange on the
//! gate succeeded. Dropping it clears `in_flight`, `loading` and
//! `background_refresh_active` and reopens the gate. This runs on every exit path of a
//! cycle: normal return, a caught panic, or the refresh future being dropped mid-flight.

use super::state::SyncTracker;

/// Holds the in-flight gate for the duration of one refresh cycle.
#[must_use = "dropping the guard immediately reopens the gate"]
pub(crate) struct CycleGuard<'a> {
    tracker: &'a SyncTracker,
}

impl<'a> CycleGuard<'a> {
    pub(super) fn new(tracker: &'a SyncTracker) -> Self {
        Self { tracker }
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.tracker.release();
    }
}
