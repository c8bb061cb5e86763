//! Runtime lifecycle management including background tasks and graceful shutdown.

use crate::{config::AppConfig, metrics::MetricsCollector};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use super::{builder::PulseRuntimeBuilder, PulseComponents, PulseHandle};

/// Owns the engine components and their background tasks.
///
/// Graceful shutdown is coordinated through a broadcast channel. When `shutdown()` is
/// called the scheduler and sweeper are signalled and awaited, and every handle starts
/// refusing manual refreshes.
pub struct PulseRuntime {
    components: PulseComponents,
    shutdown_tx: broadcast::Sender<()>,
    config: AppConfig,
    scheduler_task: Option<JoinHandle<()>>,
    sweeper_task: Option<JoinHandle<()>>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl PulseRuntime {
    #[must_use]
    pub fn builder() -> PulseRuntimeBuilder {
        PulseRuntimeBuilder::new()
    }

    /// Called by `PulseRuntimeBuilder` during initialization.
    pub(super) fn new(
        components: PulseComponents,
        shutdown_tx: broadcast::Sender<()>,
        config: AppConfig,
        enable_scheduler: bool,
        enable_sweeper: bool,
    ) -> Self {
        let scheduler_task = enable_scheduler.then(|| {
            let handle = components.scheduler().start_with_shutdown(shutdown_tx.subscribe());
            debug!("scheduler task started");
            handle
        });
        let sweeper_task = enable_sweeper.then(|| {
            let handle = components.sweeper().start_with_shutdown(shutdown_tx.subscribe());
            debug!("eviction sweeper task started");
            handle
        });

        Self {
            components,
            shutdown_tx,
            config,
            scheduler_task,
            sweeper_task,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a cloneable consumer handle.
    #[must_use]
    pub fn handle(&self) -> PulseHandle {
        PulseHandle::new(self.components.clone(), self.shutdown_initiated.clone())
    }

    #[must_use]
    pub fn components(&self) -> &PulseComponents {
        &self.components
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn metrics_collector(&self) -> &Arc<MetricsCollector> {
        self.components.metrics_collector()
    }

    #[must_use]
    pub fn has_scheduler_task(&self) -> bool {
        self.scheduler_task.is_some()
    }

    #[must_use]
    pub fn has_sweeper_task(&self) -> bool {
        self.sweeper_task.is_some()
    }

    /// Creates a new shutdown receiver for external shutdown coordination.
    #[must_use]
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Returns a sender that triggers shutdown when used, e.g. from a signal handler.
    #[must_use]
    pub fn shutdown_trigger(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Signals every background task and waits for them to finish.
    ///
    /// Returns immediately if shutdown was already initiated.
    pub async fn shutdown(self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("shutdown already initiated, ignoring duplicate call");
            return;
        }

        info!("initiating pulse runtime shutdown");
        self.components.scheduler().stop();
        if let Err(e) = self.shutdown_tx.send(()) {
            debug!(error = %e, "no shutdown receivers left");
        }

        for (name, task) in [("scheduler", self.scheduler_task), ("sweeper", self.sweeper_task)] {
            let Some(task) = task else { continue };
            match task.await {
                Ok(()) => debug!(task = name, "background task completed"),
                Err(e) if e.is_cancelled() => debug!(task = name, "background task cancelled"),
                Err(e) => error!(task = name, error = %e, "background task failed"),
            }
        }

        info!("pulse runtime shutdown complete");
    }

    /// Waits for a shutdown signal on the runtime's channel, then performs cleanup.
    pub async fn wait_for_shutdown(self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        match shutdown_rx.recv().await {
            Ok(()) => {}
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "shutdown receiver lagged behind repeated signals");
            }
            Err(RecvError::Closed) => debug!("shutdown channel closed"),
        }
        info!("shutdown signal received, runtime terminating");
        self.shutdown().await;
    }
}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    let _ = assert_send::<PulseRuntime>;
    let _ = assert_sync::<PulseRuntime>;
    let _ = assert_send::<PulseHandle>;
    let _ = assert_sync::<PulseHandle>;
};
