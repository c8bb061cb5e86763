//! Periodic eviction of stale domains.

use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::types::DomainSet;

use super::aggregator::Aggregator;

/// How often the sweeper runs and how old a domain may get before it is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionPolicy {
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    #[serde(default = "default_max_age_ms")]
    pub max_age_ms: u64,
}

fn default_period_ms() -> u64 {
    300_000
}

fn default_max_age_ms() -> u64 {
    1_800_000
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self { period_ms: default_period_ms(), max_age_ms: default_max_age_ms() }
    }
}

impl EvictionPolicy {
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    #[must_use]
    pub fn max_age(&self) -> Duration {
        Duration::from_millis(self.max_age_ms)
    }
}

/// Drops domains the scheduler has not managed to refresh within the staleness horizon.
///
/// All mutations go through [`Aggregator::evict_stale`], which protects an in-flight
/// cycle's targets.
pub struct EvictionSweeper {
    aggregator: Arc<Aggregator>,
    policy: EvictionPolicy,
}

impl EvictionSweeper {
    #[must_use]
    pub fn new(aggregator: Arc<Aggregator>, policy: EvictionPolicy) -> Self {
        Self { aggregator, policy }
    }

    /// Runs one sweep now.
    pub fn sweep(&self) -> DomainSet {
        self.aggregator.evict_stale(self.policy.max_age())
    }

    /// Spawns the sweep loop. The first sweep runs one period after start.
    #[must_use]
    pub fn start_with_shutdown(&self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let aggregator = self.aggregator.clone();
        let policy = self.policy.clone();

        tokio::spawn(async move {
            let period = policy.period();
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        info!("eviction sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = aggregator.evict_stale(policy.max_age());
                        debug!(evicted = %evicted, "eviction sweep complete");
                    }
                }
            }
        })
    }
}
