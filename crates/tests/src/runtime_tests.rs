//! Runtime lifecycle and background scheduling against a mock explorer.
//!
//! Requests without a registered mock get mockito's 501, which counts as a failed source.
//! Tests use short intervals and `tokio::time::timeout` to avoid hanging on failures.

use crate::mock_infrastructure::{blockchain_data, explorer_mock, test_config, ExplorerMock};
use pulse_core::{
    runtime::{EngineError, HealthStatus, PulseRuntimeBuilder},
    sync::{CycleKind, SchedulerState, SyncError},
};
use serde_json::json;
use tokio::time::{timeout, Duration};

#[tokio::test]
async fn test_background_polling_populates_snapshot() {
    let mut explorer = ExplorerMock::new().await;
    let _consolidated = explorer
        .ok(explorer_mock::CONSOLIDATED, json!({ "blockchain": blockchain_data() }), 2)
        .await;

    let mut config = test_config(&explorer.url());
    config.polling.interval_ms = 50;
    let runtime = PulseRuntimeBuilder::new().with_config(config).build().unwrap();
    let handle = runtime.handle();

    let mut sync = handle.subscribe_sync_state();
    timeout(Duration::from_secs(5), sync.wait_for(|s| s.cycles >= 2))
        .await
        .expect("two background cycles")
        .unwrap();

    assert!(handle.snapshot().chain.is_some());
    assert_eq!(handle.status(), HealthStatus::Healthy);
    let state = handle.sync_state();
    assert!(state.last_success_at.is_some());
    assert!(!state.loading);

    runtime.shutdown().await;
    assert_eq!(handle.scheduler_state(), SchedulerState::Stopped);
}

#[tokio::test]
async fn test_repeated_failures_pause_until_manual_success() {
    let mut explorer = ExplorerMock::new().await;

    let mut config = test_config(&explorer.url());
    config.polling.interval_ms = 20;
    config.polling.max_consecutive_failures = 3;
    let runtime = PulseRuntimeBuilder::new().with_config(config).disable_sweeper().build().unwrap();
    let handle = runtime.handle();

    let mut scheduler = handle.subscribe_scheduler_state();
    timeout(Duration::from_secs(5), scheduler.wait_for(|s| *s == SchedulerState::Paused))
        .await
        .expect("scheduler pauses")
        .unwrap();

    assert_eq!(handle.status(), HealthStatus::Paused);
    assert_eq!(
        handle.scheduler_error(),
        Some(SyncError::SchedulerPaused { failures: 3 })
    );
    let cycles_when_paused = handle.sync_state().cycles;
    assert_eq!(cycles_when_paused, 3);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.sync_state().cycles, cycles_when_paused);

    let _consolidated = explorer
        .ok(explorer_mock::CONSOLIDATED, json!({ "blockchain": blockchain_data() }), 1)
        .await;
    let outcome = handle.refresh_now().await.unwrap();

    assert_eq!(outcome.kind(), Some(CycleKind::Updated));
    assert_eq!(handle.scheduler_state(), SchedulerState::Scheduled);
    assert_eq!(handle.sync_state().consecutive_failures, 0);
    assert!(handle.sync_state().last_error.is_none());
    assert!(handle.scheduler_error().is_none());

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_manual_refreshes_share_one_round() {
    let mut explorer = ExplorerMock::new().await;
    let consolidated = explorer
        .ok(explorer_mock::CONSOLIDATED, json!({ "blockchain": blockchain_data() }), 1)
        .await;

    let runtime = PulseRuntimeBuilder::new()
        .with_config(test_config(&explorer.url()))
        .disable_scheduler()
        .build()
        .unwrap();
    let handle = runtime.handle();

    let (first, second) = tokio::join!(handle.refresh_now(), handle.refresh_now());
    let kinds = [first.unwrap().kind(), second.unwrap().kind()];

    assert!(kinds.contains(&Some(CycleKind::Updated)));
    assert!(kinds.contains(&None));
    assert_eq!(handle.sync_state().cycles, 1);
    assert_eq!(handle.metrics_summary().cycles_skipped, 1);
    consolidated.assert_async().await;

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_handle_outlives_runtime() {
    let explorer = ExplorerMock::new().await;
    let runtime = PulseRuntimeBuilder::new()
        .with_config(test_config(&explorer.url()))
        .disable_scheduler()
        .build()
        .unwrap();
    let handle = runtime.handle();
    let clone = handle.clone();

    runtime.shutdown().await;

    assert_eq!(clone.refresh_now().await.unwrap_err(), EngineError::ShutDown);
    assert!(handle.snapshot().domains().is_empty());
    assert_eq!(handle.status(), HealthStatus::Starting);
}
