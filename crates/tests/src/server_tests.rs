//! Service routes driven end to end: router, runtime and a mock explorer.

use crate::mock_infrastructure::{
    blockchain_data, explorer_mock, manual_runtime, mining_data, test_config, ExplorerMock,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use pulse_core::{runtime::PulseRuntimeBuilder, sync::SchedulerState};
use serde_json::{json, Value};
use server::router::create_app;
use tokio::time::{timeout, Duration};
use tower::ServiceExt;

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).method(method).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_manual_refresh_route_reports_partial_cycle() {
    let mut explorer = ExplorerMock::new().await;
    let _mocks = [
        explorer.rejected(explorer_mock::CONSOLIDATED, 1).await,
        explorer.ok(explorer_mock::BLOCKCHAIN, blockchain_data(), 1).await,
        explorer.ok(explorer_mock::MINING, mining_data(), 1).await,
    ];

    let runtime = manual_runtime(test_config(&explorer.url()));
    let app = create_app(runtime.handle(), runtime.config());

    let (status, body) = send(app.clone(), "POST", "/api/v1/refresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "partial");
    assert_eq!(body["updated"], json!(["chain", "mining"]));
    assert_eq!(body["status"], "degraded");

    let (status, body) = send(app.clone(), "GET", "/api/v1/snapshot").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chain"]["blocks"], 3_210_000);
    assert!(body["mempool"].is_null());
    assert!(body["updatedAt"].is_string());

    let (status, body) = send(app.clone(), "GET", "/api/v1/sync-state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sync"]["lastOutcome"], "partial");
    assert_eq!(body["sync"]["consecutiveFailures"], 0);

    let (status, body) = send(app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["domains"], json!(["chain", "mining"]));

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_health_is_unavailable_when_nothing_is_cached() {
    let explorer = ExplorerMock::new().await;
    let runtime = manual_runtime(test_config(&explorer.url()));
    let app = create_app(runtime.handle(), runtime.config());

    let (_, body) = send(app.clone(), "POST", "/api/v1/refresh").await;
    assert_eq!(body["outcome"], "failed");

    let (status, body) = send(app.clone(), "GET", "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "failing");
    assert_eq!(body["consecutiveFailures"], 1);

    let (_, body) = send(app, "GET", "/api/v1/sync-state").await;
    assert_eq!(body["sync"]["lastError"]["kind"], "total_sync_failure");

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_metrics_route_exposes_cycle_counters() {
    let mut explorer = ExplorerMock::new().await;
    let _consolidated = explorer
        .ok(explorer_mock::CONSOLIDATED, json!({ "blockchain": blockchain_data() }), 1)
        .await;
    let runtime = manual_runtime(test_config(&explorer.url()));
    let app = create_app(runtime.handle(), runtime.config());

    send(app.clone(), "POST", "/api/v1/refresh").await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("pulse_cycles_total"));

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_sync_state_route_reports_paused_scheduler() {
    let explorer = ExplorerMock::new().await;
    let mut config = test_config(&explorer.url());
    config.polling.interval_ms = 20;
    config.polling.max_consecutive_failures = 2;
    let runtime = PulseRuntimeBuilder::new().with_config(config).disable_sweeper().build().unwrap();
    let handle = runtime.handle();
    let app = create_app(handle.clone(), runtime.config());

    let mut scheduler = handle.subscribe_scheduler_state();
    timeout(Duration::from_secs(5), scheduler.wait_for(|s| *s == SchedulerState::Paused))
        .await
        .expect("scheduler pauses")
        .unwrap();

    let (status, body) = send(app.clone(), "GET", "/api/v1/sync-state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused");
    assert_eq!(body["scheduler"], "paused");
    assert_eq!(body["schedulerError"]["kind"], "scheduler_paused");
    assert_eq!(body["sync"]["lastError"]["kind"], "total_sync_failure");

    let (_, body) = send(app, "GET", "/health").await;
    assert_eq!(body["schedulerError"]["kind"], "scheduler_paused");

    runtime.shutdown().await;
}
