//! Core component container for the Pulse runtime.

use crate::{
    metrics::MetricsCollector,
    sync::{Aggregator, EvictionSweeper, SmartScheduler, StateStore},
};
use std::sync::Arc;

/// Container for all initialized Pulse components.
///
/// All components are wrapped in `Arc` and shared between the runtime, its background
/// tasks and every [`PulseHandle`](super::PulseHandle).
#[derive(Clone)]
pub struct PulseComponents {
    metrics_collector: Arc<MetricsCollector>,
    store: Arc<StateStore>,
    aggregator: Arc<Aggregator>,
    scheduler: Arc<SmartScheduler>,
    sweeper: Arc<EvictionSweeper>,
}

impl PulseComponents {
    /// Called by `PulseRuntimeBuilder` during initialization.
    #[must_use]
    pub fn new(
        metrics_collector: Arc<MetricsCollector>,
        store: Arc<StateStore>,
        aggregator: Arc<Aggregator>,
        scheduler: Arc<SmartScheduler>,
        sweeper: Arc<EvictionSweeper>,
    ) -> Self {
        Self { metrics_collector, store, aggregator, scheduler, sweeper }
    }

    #[must_use]
    pub fn metrics_collector(&self) -> &Arc<MetricsCollector> {
        &self.metrics_collector
    }

    #[must_use]
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    #[must_use]
    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    #[must_use]
    pub fn scheduler(&self) -> &Arc<SmartScheduler> {
        &self.scheduler
    }

    #[must_use]
    pub fn sweeper(&self) -> &Arc<EvictionSweeper> {
        &self.sweeper
    }
}
