//! Smart interval scheduler.
//!
//! Drives automatic background cycles with a fixed delay between the end of one cycle
//! and the start of the next, pauses after repeated failure, and lets a manual refresh
//! bring it back.
//!
//! # State Machine
//!
//! ```text
//!          start
//!   Idle ────────► Scheduled ──(delay elapsed)──► Running
//!                     ▲  ▲                           │
//!                     │  └──── success / skipped ────┤
//!                     │                              │ failure, streak ≥ max
//!      manual success │                              ▼
//!                     └────────────────────────── Paused
//!
//!   any state ──(stop / shutdown)──► Stopped
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{broadcast, watch, Notify},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::metrics::MetricsCollector;

use super::{
    aggregator::{Aggregator, CycleOutcome},
    errors::SyncError,
};

/// Polling configuration. Immutable once the scheduler is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingPolicy {
    /// Delay between the end of one automatic cycle and the start of the next.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Failed cycles in a row after which automatic polling pauses.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    #[serde(default = "default_pause_on_error")]
    pub pause_on_error: bool,
    /// Run the first cycle immediately instead of after one interval.
    #[serde(default = "default_immediate")]
    pub immediate: bool,
}

fn default_interval_ms() -> u64 {
    60_000
}

fn default_max_consecutive_failures() -> u32 {
    3
}

fn default_pause_on_error() -> bool {
    true
}

fn default_immediate() -> bool {
    true
}

impl Default for PollingPolicy {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
            pause_on_error: default_pause_on_error(),
            immediate: default_immediate(),
        }
    }
}

impl PollingPolicy {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    fn should_pause(&self, failures: u32) -> bool {
        self.pause_on_error && failures >= self.max_consecutive_failures
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Scheduled,
    Running,
    Paused,
    Stopped,
}

impl SchedulerState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }
}

struct Core {
    state: SchedulerState,
    failures: u32,
    /// Set while `Paused`.
    pause_error: Option<SyncError>,
}

/// State shared between the polling task and manual triggers.
struct Shared {
    core: Mutex<Core>,
    state_tx: watch::Sender<SchedulerState>,
    /// Re-arms the pending delay (manual success) or wakes a paused/stopping loop.
    wake: Notify,
    metrics: Arc<MetricsCollector>,
}

impl Shared {
    fn state(&self) -> SchedulerState {
        self.core.lock().state
    }

    fn transition(&self, core: &mut Core, next: SchedulerState) {
        if core.state == next {
            return;
        }
        debug!(from = core.state.as_str(), to = next.as_str(), "scheduler transition");
        core.state = next;
        let failures = core.failures;
        core.pause_error =
            (next == SchedulerState::Paused).then(|| SyncError::SchedulerPaused { failures });
        self.state_tx.send_replace(next);
        self.metrics.record_scheduler_transition(next);
    }

    /// Moves to `Running` unless paused or stopped.
    fn begin_automatic(&self) -> bool {
        let mut core = self.core.lock();
        match core.state {
            SchedulerState::Paused | SchedulerState::Stopped => false,
            _ => {
                self.transition(&mut core, SchedulerState::Running);
                true
            }
        }
    }

    fn finish_automatic(&self, outcome: &CycleOutcome, policy: &PollingPolicy) {
        let mut core = self.core.lock();
        if core.state == SchedulerState::Stopped {
            return;
        }

        let next = match outcome {
            CycleOutcome::Skipped => SchedulerState::Scheduled,
            CycleOutcome::Updated(_) | CycleOutcome::Partial(_) => {
                core.failures = 0;
                SchedulerState::Scheduled
            }
            CycleOutcome::Failed(_) => {
                core.failures = core.failures.saturating_add(1);
                if policy.should_pause(core.failures) {
                    warn!(
                        consecutive_failures = core.failures,
                        "pausing automatic refresh after repeated failures"
                    );
                    SchedulerState::Paused
                } else {
                    SchedulerState::Scheduled
                }
            }
        };
        self.transition(&mut core, next);
    }

    fn finish_manual(&self, outcome: &CycleOutcome, policy: &PollingPolicy) {
        let mut core = self.core.lock();
        if core.state == SchedulerState::Stopped {
            return;
        }

        match outcome {
            CycleOutcome::Skipped => {}
            CycleOutcome::Updated(_) | CycleOutcome::Partial(_) => {
                core.failures = 0;
                if core.state == SchedulerState::Paused {
                    info!("manual refresh succeeded, resuming automatic refresh");
                    self.transition(&mut core, SchedulerState::Scheduled);
                }
                drop(core);
                self.wake.notify_one();
            }
            CycleOutcome::Failed(_) => {
                if core.state == SchedulerState::Paused {
                    return;
                }
                core.failures = core.failures.saturating_add(1);
                if policy.should_pause(core.failures) {
                    warn!(
                        consecutive_failures = core.failures,
                        "pausing automatic refresh after repeated failures"
                    );
                    self.transition(&mut core, SchedulerState::Paused);
                }
            }
        }
    }

    fn stop(&self) {
        let mut core = self.core.lock();
        self.transition(&mut core, SchedulerState::Stopped);
        drop(core);
        self.wake.notify_one();
    }
}

/// Periodically triggers background refresh cycles on an [`Aggregator`].
pub struct SmartScheduler {
    aggregator: Arc<Aggregator>,
    policy: PollingPolicy,
    shared: Arc<Shared>,
}

impl SmartScheduler {
    #[must_use]
    pub fn new(
        aggregator: Arc<Aggregator>,
        policy: PollingPolicy,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SchedulerState::Idle);
        let shared = Arc::new(Shared {
            core: Mutex::new(Core { state: SchedulerState::Idle, failures: 0, pause_error: None }),
            state_tx,
            wake: Notify::new(),
            metrics,
        });
        Self { aggregator, policy, shared }
    }

    #[must_use]
    pub fn policy(&self) -> &PollingPolicy {
        &self.policy
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.shared.state()
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.shared.state_tx.subscribe()
    }

    /// Failed cycles in a row as seen by the scheduler.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.shared.core.lock().failures
    }

    /// Returns [`SyncError::SchedulerPaused`] while automatic polling is paused.
    #[must_use]
    pub fn pause_error(&self) -> Option<SyncError> {
        self.shared.core.lock().pause_error.clone()
    }

    /// Runs a user-visible refresh now, regardless of the pause state.
    ///
    /// A success resets the failure streak, leaves `Paused`, and restarts the fixed delay
    /// from this completion. A failure while paused keeps the scheduler paused.
    pub async fn refresh_now(&self) -> CycleOutcome {
        let outcome = self.aggregator.refresh(true).await;
        self.shared.finish_manual(&outcome, &self.policy);
        outcome
    }

    /// Stops automatic polling. The polling task exits at its next wake-up.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Spawns the polling task. It exits on `stop()` or when `shutdown_rx` fires.
    #[must_use]
    pub fn start_with_shutdown(&self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let aggregator = self.aggregator.clone();
        let policy = self.policy.clone();
        let shared = self.shared.clone();

        {
            let mut core = shared.core.lock();
            if core.state == SchedulerState::Idle {
                shared.transition(&mut core, SchedulerState::Scheduled);
            }
        }

        tokio::spawn(async move {
            let interval = policy.interval();
            let mut delay = if policy.immediate { Duration::ZERO } else { interval };
            info!(interval_ms = policy.interval_ms, immediate = policy.immediate, "scheduler started");

            loop {
                match shared.state() {
                    SchedulerState::Stopped => break,
                    SchedulerState::Paused => {
                        tokio::select! {
                            biased;
                            _ = shutdown_rx.recv() => break,
                            () = shared.wake.notified() => {
                                delay = interval;
                                continue;
                            }
                        }
                    }
                    _ => {}
                }

                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    () = shared.wake.notified() => {
                        delay = interval;
                        continue;
                    }
                    () = tokio::time::sleep(delay) => {}
                }

                if !shared.begin_automatic() {
                    continue;
                }
                let outcome = aggregator.refresh(false).await;
                shared.finish_automatic(&outcome, &policy);
                delay = interval;
            }

            shared.stop();
            info!("scheduler shutting down");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sync::testing::{self, Reply, ScriptedTransport},
        upstream::EndpointKey,
    };
    use serde_json::json;
    use tokio::time::sleep;

    fn policy(interval_ms: u64, max_consecutive_failures: u32) -> PollingPolicy {
        PollingPolicy { interval_ms, max_consecutive_failures, pause_on_error: true, immediate: true }
    }

    fn scheduler(transport: &Arc<ScriptedTransport>, policy: PollingPolicy) -> SmartScheduler {
        SmartScheduler::new(
            testing::aggregator(transport),
            policy,
            Arc::new(MetricsCollector::new().unwrap()),
        )
    }

    fn healthy(transport: &ScriptedTransport) {
        transport.set(
            EndpointKey::Consolidated,
            Reply::Data(json!({ "blockchain": testing::blockchain_data() })),
        );
    }

    #[test]
    fn test_policy_defaults() {
        let policy = PollingPolicy::default();
        assert_eq!(policy.interval(), Duration::from_secs(60));
        assert_eq!(policy.max_consecutive_failures, 3);
        assert!(policy.pause_on_error);
        assert!(policy.immediate);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_between_cycles() {
        let transport = Arc::new(ScriptedTransport::new().with_delay(Duration::from_millis(300)));
        healthy(&transport);
        let scheduler = scheduler(&transport, policy(1_000, 3));
        let (shutdown_tx, _) = broadcast::channel(1);

        let task = scheduler.start_with_shutdown(shutdown_tx.subscribe());

        // Cycles start at 0, 1300, 2600 (300 ms fetch + 1000 ms delay).
        sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.call_count(EndpointKey::Consolidated), 1);
        sleep(Duration::from_millis(1_250)).await;
        assert_eq!(transport.call_count(EndpointKey::Consolidated), 2);
        sleep(Duration::from_millis(1_000)).await;
        assert_eq!(transport.call_count(EndpointKey::Consolidated), 2);
        sleep(Duration::from_millis(300)).await;
        assert_eq!(transport.call_count(EndpointKey::Consolidated), 3);

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_immediate_waits_one_interval() {
        let transport = Arc::new(ScriptedTransport::new());
        healthy(&transport);
        let scheduler =
            scheduler(&transport, PollingPolicy { immediate: false, ..policy(5_000, 3) });
        let (shutdown_tx, _) = broadcast::channel(1);

        let task = scheduler.start_with_shutdown(shutdown_tx.subscribe());
        sleep(Duration::from_millis(4_900)).await;
        assert!(transport.calls().is_empty());
        assert_eq!(scheduler.state(), SchedulerState::Scheduled);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(transport.call_count(EndpointKey::Consolidated), 1);

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_after_max_failures_and_resumes_on_manual_success() {
        let transport = Arc::new(ScriptedTransport::new());
        let scheduler = scheduler(&transport, policy(1_000, 3));
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut state_rx = scheduler.subscribe_state();

        let task = scheduler.start_with_shutdown(shutdown_tx.subscribe());
        state_rx.wait_for(|s| *s == SchedulerState::Paused).await.unwrap();

        assert_eq!(scheduler.consecutive_failures(), 3);
        assert_eq!(transport.call_count(EndpointKey::Consolidated), 3);
        let paused = scheduler.pause_error().unwrap();
        assert_eq!(paused.kind(), "scheduler_paused");
        assert_eq!(paused, SyncError::SchedulerPaused { failures: 3 });

        // No automatic cycles while paused.
        sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.call_count(EndpointKey::Consolidated), 3);

        healthy(&transport);
        let outcome = scheduler.refresh_now().await;
        assert!(outcome.is_success());
        assert_eq!(scheduler.state(), SchedulerState::Scheduled);
        assert_eq!(scheduler.consecutive_failures(), 0);
        assert!(scheduler.pause_error().is_none());
        assert_eq!(transport.call_count(EndpointKey::Consolidated), 4);

        // Next automatic cycle one interval after the manual completion.
        sleep(Duration::from_millis(900)).await;
        assert_eq!(transport.call_count(EndpointKey::Consolidated), 4);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(transport.call_count(EndpointKey::Consolidated), 5);

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_failure_while_paused_stays_paused() {
        let transport = Arc::new(ScriptedTransport::new());
        let scheduler = scheduler(&transport, policy(1_000, 1));
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut state_rx = scheduler.subscribe_state();

        let task = scheduler.start_with_shutdown(shutdown_tx.subscribe());
        state_rx.wait_for(|s| *s == SchedulerState::Paused).await.unwrap();

        let outcome = scheduler.refresh_now().await;
        assert!(matches!(outcome, CycleOutcome::Failed(_)));
        assert_eq!(scheduler.state(), SchedulerState::Paused);

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_pause_when_disabled() {
        let transport = Arc::new(ScriptedTransport::new());
        let scheduler =
            scheduler(&transport, PollingPolicy { pause_on_error: false, ..policy(1_000, 2) });
        let (shutdown_tx, _) = broadcast::channel(1);

        let task = scheduler.start_with_shutdown(shutdown_tx.subscribe());
        sleep(Duration::from_millis(4_500)).await;

        assert_eq!(transport.call_count(EndpointKey::Consolidated), 5);
        assert_ne!(scheduler.state(), SchedulerState::Paused);

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_wait() {
        let transport = Arc::new(ScriptedTransport::new());
        healthy(&transport);
        let scheduler = scheduler(&transport, policy(10_000, 3));
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let task = scheduler.start_with_shutdown(shutdown_tx.subscribe());
        sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.call_count(EndpointKey::Consolidated), 1);

        scheduler.stop();
        tokio::time::timeout(Duration::from_millis(50), task).await.unwrap().unwrap();

        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.call_count(EndpointKey::Consolidated), 1);
    }
}
