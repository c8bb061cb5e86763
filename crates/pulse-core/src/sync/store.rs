//! Latest-known snapshot of every telemetry domain.
//!
//! `StateStore` is the single source of truth consumers read from. Reads are lock-free
//! (`ArcSwap`); writes are serialized by a mutex and performed only by the orchestrator,
//! which builds a new [`Snapshot`] from the current one and swaps it in. Every write is
//! published on a `watch` channel.

use arc_swap::ArcSwap;
use chrono::Utc;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, time::Instant};
use tracing::trace;

use crate::types::{Domain, DomainSet, PartialSnapshot, Snapshot};

pub struct StateStore {
    current: ArcSwap<Snapshot>,
    write_lock: Mutex<()>,
    tx: watch::Sender<Arc<Snapshot>>,
}

impl StateStore {
    #[must_use]
    pub fn new() -> Self {
        let initial = Arc::new(Snapshot::default());
        let (tx, _) = watch::channel(initial.clone());
        Self { current: ArcSwap::new(initial), write_lock: Mutex::new(()), tx }
    }

    /// Returns the current snapshot.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Subscribes to snapshot replacements. The receiver starts at the current snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    /// Overwrites the fields present in `partial`, stamps them, and sets `updated_at`.
    ///
    /// Fields absent from `partial` keep their cached value. Returns the domains written;
    /// an empty partial leaves the store untouched.
    pub(crate) fn merge_fields(&self, partial: PartialSnapshot) -> DomainSet {
        let domains = partial.domains();
        if domains.is_empty() {
            return domains;
        }

        let _guard = self.write_lock.lock();
        let mut next = Snapshot::clone(&self.current.load());
        next.apply(partial, Instant::now());
        next.updated_at = Some(Utc::now());
        self.publish(next);

        trace!(domains = %domains, "snapshot fields merged");
        domains
    }

    /// Drops every domain whose last refresh is older than `max_age`, except `protected`.
    ///
    /// `updated_at` is left unchanged. Returns the evicted domains.
    pub(crate) fn clear_stale(&self, max_age: Duration, protected: DomainSet) -> DomainSet {
        let _guard = self.write_lock.lock();
        let current = self.current.load();
        let now = Instant::now();

        let stale: DomainSet = Domain::ALL
            .into_iter()
            .filter(|domain| !protected.contains(*domain))
            .filter(|domain| {
                current
                    .refreshed_at(*domain)
                    .is_some_and(|at| now.saturating_duration_since(at) > max_age)
            })
            .collect();
        if stale.is_empty() {
            return stale;
        }

        let mut next = Snapshot::clone(&current);
        for domain in stale.iter() {
            next.evict(domain);
        }
        self.publish(next);
        stale
    }

    fn publish(&self, next: Snapshot) {
        let next = Arc::new(next);
        self.current.store(next.clone());
        self.tx.send_replace(next);
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
