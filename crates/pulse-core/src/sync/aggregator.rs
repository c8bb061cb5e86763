//! Refresh orchestration: dedup gate, composition, merge, and sync-state accounting.

use chrono::Utc;
use futures::FutureExt;
use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};
use tokio::{sync::watch, time::Instant};
use tracing::{debug, error, info, warn};

use crate::{
    metrics::MetricsCollector,
    types::{DomainSet, Snapshot},
    upstream::EndpointKey,
};

use super::{
    composer::{FallbackComposer, FetchOutcome},
    errors::SyncError,
    state::{CycleKind, SyncState, SyncTracker},
    store::StateStore,
};

/// Accounting for one executed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Domains written to the store.
    pub updated: DomainSet,
    pub outcomes: Vec<FetchOutcome>,
    pub elapsed: Duration,
}

impl CycleReport {
    /// Keys of the sources that failed this cycle.
    pub fn failed_sources(&self) -> impl Iterator<Item = EndpointKey> + '_ {
        self.outcomes.iter().filter(|o| !o.ok).map(|o| o.key)
    }
}

/// Result of [`Aggregator::refresh`].
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Another cycle was in flight; nothing was fetched.
    Skipped,
    Updated(CycleReport),
    Partial(CycleReport),
    Failed(CycleReport),
}

impl CycleOutcome {
    /// Returns the result class, or `None` for a skipped cycle.
    #[must_use]
    pub fn kind(&self) -> Option<CycleKind> {
        match self {
            Self::Skipped => None,
            Self::Updated(_) => Some(CycleKind::Updated),
            Self::Partial(_) => Some(CycleKind::Partial),
            Self::Failed(_) => Some(CycleKind::Failed),
        }
    }

    #[must_use]
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Skipped => None,
            Self::Updated(r) | Self::Partial(r) | Self::Failed(r) => Some(r),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Updated(_) | Self::Partial(_))
    }
}

/// Owns the refresh cycle and the [`SyncState`].
///
/// `refresh` never returns an error: upstream failures become fetch outcomes, a cycle
/// with no refreshed domain becomes a [`SyncError::TotalSyncFailure`] in the sync state,
/// and a panic inside the cycle is caught and recorded the same way.
pub struct Aggregator {
    composer: FallbackComposer,
    store: Arc<StateStore>,
    tracker: SyncTracker,
    metrics: Arc<MetricsCollector>,
}

impl Aggregator {
    #[must_use]
    pub fn new(
        composer: FallbackComposer,
        store: Arc<StateStore>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self { composer, store, tracker: SyncTracker::new(), metrics }
    }

    /// Runs one refresh cycle unless one is already in flight.
    ///
    /// `is_initial_load` marks a user-visible load: it clears `last_error` and sets
    /// `loading`. Otherwise the cycle is a silent background refresh.
    pub async fn refresh(&self, is_initial_load: bool) -> CycleOutcome {
        let Some(_guard) = self.tracker.try_begin(is_initial_load) else {
            debug!(is_initial_load, "refresh skipped, cycle already in flight");
            self.metrics.record_cycle_skipped();
            return CycleOutcome::Skipped;
        };

        let started = Instant::now();
        match AssertUnwindSafe(self.run_cycle(started)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let detail = format!("cycle panicked: {}", panic_message(panic.as_ref()));
                error!(%detail, "refresh cycle aborted");
                let report =
                    CycleReport { updated: DomainSet::EMPTY, outcomes: Vec::new(), elapsed: started.elapsed() };
                self.record_total_failure(0, detail, &report);
                CycleOutcome::Failed(report)
            }
        }
    }

    async fn run_cycle(&self, started: Instant) -> CycleOutcome {
        let (partial, outcomes) = self.composer.compose().await;
        let updated = self.store.merge_fields(partial);
        let report = CycleReport { updated, outcomes, elapsed: started.elapsed() };

        if updated.is_empty() {
            let attempted = report.outcomes.len();
            let detail = report
                .outcomes
                .iter()
                .rev()
                .find_map(|o| o.error.as_ref())
                .map_or_else(|| "no sources configured".to_string(), ToString::to_string);
            self.record_total_failure(attempted, detail, &report);
            return CycleOutcome::Failed(report);
        }

        let individual_failed =
            report.outcomes.iter().any(|o| !o.ok && o.key != EndpointKey::Consolidated);
        let kind = if individual_failed { CycleKind::Partial } else { CycleKind::Updated };

        self.tracker.record_success(kind, Utc::now());
        self.metrics.record_cycle(kind, report.elapsed);
        self.metrics.record_consecutive_failures(0);

        if kind == CycleKind::Partial {
            let failed: Vec<&str> = report.failed_sources().map(|k| k.as_str()).collect();
            info!(updated = %updated, failed = ?failed, "partial sync, serving cached values for failed domains");
            CycleOutcome::Partial(report)
        } else {
            debug!(updated = %updated, elapsed_ms = report.elapsed.as_millis(), "sync cycle complete");
            CycleOutcome::Updated(report)
        }
    }

    fn record_total_failure(&self, attempted: usize, detail: String, report: &CycleReport) {
        let failures =
            self.tracker.record_failure(SyncError::TotalSyncFailure { attempted, detail });
        self.metrics.record_cycle(CycleKind::Failed, report.elapsed);
        self.metrics.record_consecutive_failures(failures);
        warn!(
            consecutive_failures = failures,
            attempted,
            "sync cycle refreshed no domains, keeping cached values"
        );
    }

    /// Evicts domains whose last refresh is older than `max_age`.
    ///
    /// While a cycle is in flight every domain is protected, since any of them may be
    /// about to be written. Returns the evicted domains.
    pub fn evict_stale(&self, max_age: Duration) -> DomainSet {
        let protected =
            if self.tracker.is_in_flight() { DomainSet::all() } else { DomainSet::EMPTY };
        let evicted = self.store.clear_stale(max_age, protected);

        for domain in evicted.iter() {
            self.metrics.record_eviction(domain);
        }
        if !evicted.is_empty() {
            info!(evicted = %evicted, max_age_ms = max_age.as_millis(), "evicted stale domains");
        }
        evicted
    }

    #[must_use]
    pub fn sync_state(&self) -> SyncState {
        self.tracker.current()
    }

    #[must_use]
    pub fn subscribe_sync_state(&self) -> watch::Receiver<SyncState> {
        self.tracker.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.get()
    }

    #[must_use]
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    #[must_use]
    pub fn composer(&self) -> &FallbackComposer {
        &self.composer
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
