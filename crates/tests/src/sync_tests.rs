//! End-to-end refresh cycles over HTTP: consolidated success, fallback to individual
//! sources, partial and total failure.

use crate::mock_infrastructure::{
    blockchain_data, explorer_mock, manual_runtime, mempool_data, mining_data, network_data,
    staking_data, test_config, ExplorerMock,
};
use pulse_core::{
    runtime::HealthStatus,
    sync::{CycleKind, SyncError},
    types::Domain,
    upstream::EndpointKey,
};
use serde_json::json;

#[tokio::test]
async fn test_consolidated_success_skips_individual_sources() {
    let mut explorer = ExplorerMock::new().await;
    let consolidated = explorer
        .ok(
            explorer_mock::CONSOLIDATED,
            json!({ "blockchain": blockchain_data(), "mining": mining_data(), "network": network_data() }),
            1,
        )
        .await;
    let mut individual = Vec::new();
    for path in explorer_mock::INDIVIDUAL {
        individual.push(explorer.ok(path, json!({}), 0).await);
    }

    let runtime = manual_runtime(test_config(&explorer.url()));
    let handle = runtime.handle();
    let outcome = handle.refresh_now().await.unwrap();

    assert_eq!(outcome.kind(), Some(CycleKind::Updated));
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.chain.as_ref().map(|c| c.blocks), Some(3_210_000));
    assert!(snapshot.mining.is_some());
    assert_eq!(snapshot.network.as_ref().and_then(|n| n.connections), Some(16));
    assert!(snapshot.mempool.is_none());

    consolidated.assert_async().await;
    for mock in individual {
        mock.assert_async().await;
    }
    runtime.shutdown().await;
}

#[tokio::test]
async fn test_rejected_consolidated_falls_back_to_individual_sources() {
    let mut explorer = ExplorerMock::new().await;
    let consolidated = explorer.rejected(explorer_mock::CONSOLIDATED, 1).await;
    let blockchain = explorer.ok(explorer_mock::BLOCKCHAIN, blockchain_data(), 1).await;
    let mining = explorer.ok(explorer_mock::MINING, mining_data(), 1).await;
    let mempool = explorer.status(explorer_mock::MEMPOOL, 404, 1).await;
    let staking = explorer.status(explorer_mock::STAKING, 404, 1).await;
    let sidechains = explorer.status(explorer_mock::SIDECHAINS, 404, 1).await;

    let runtime = manual_runtime(test_config(&explorer.url()));
    let handle = runtime.handle();
    let outcome = handle.refresh_now().await.unwrap();

    assert_eq!(outcome.kind(), Some(CycleKind::Partial));
    let report = outcome.report().unwrap();
    assert_eq!(report.updated.iter().collect::<Vec<_>>(), vec![Domain::Chain, Domain::Mining]);
    let mut failed: Vec<EndpointKey> = report.failed_sources().collect();
    failed.sort_by_key(EndpointKey::as_str);
    assert_eq!(
        failed,
        vec![
            EndpointKey::Consolidated,
            EndpointKey::Mempool,
            EndpointKey::Sidechains,
            EndpointKey::Staking
        ]
    );

    let snapshot = handle.snapshot();
    assert!(snapshot.chain.is_some());
    assert!(snapshot.mining.is_some());
    assert!(snapshot.mempool.is_none());
    assert!(snapshot.staking.is_none());

    let sync = handle.sync_state();
    assert_eq!(sync.consecutive_failures, 0);
    assert!(sync.last_error.is_none());
    assert!(!sync.in_flight);
    assert_eq!(handle.status(), HealthStatus::Degraded);

    for mock in [consolidated, blockchain, mining, mempool, staking, sidechains] {
        mock.assert_async().await;
    }
    runtime.shutdown().await;
}

#[tokio::test]
async fn test_total_failure_keeps_cached_domains() {
    let mut explorer = ExplorerMock::new().await;
    let _first = explorer
        .ok(explorer_mock::CONSOLIDATED, json!({ "mempool": mempool_data(), "staking": staking_data() }), 1)
        .await;

    let runtime = manual_runtime(test_config(&explorer.url()));
    let handle = runtime.handle();
    assert_eq!(handle.refresh_now().await.unwrap().kind(), Some(CycleKind::Updated));
    let before = handle.snapshot();

    let mut failing = vec![explorer.status(explorer_mock::CONSOLIDATED, 404, 1).await];
    for path in explorer_mock::INDIVIDUAL {
        failing.push(explorer.status(path, 404, 1).await);
    }
    let outcome = handle.refresh_now().await.unwrap();

    assert_eq!(outcome.kind(), Some(CycleKind::Failed));
    let after = handle.snapshot();
    assert_eq!(after.mempool, before.mempool);
    assert_eq!(after.staking, before.staking);
    assert_eq!(after.updated_at, before.updated_at);

    let sync = handle.sync_state();
    assert_eq!(sync.consecutive_failures, 1);
    assert!(matches!(sync.last_error, Some(SyncError::TotalSyncFailure { attempted: 6, .. })));
    assert_eq!(handle.status(), HealthStatus::Degraded);
    for mock in failing {
        mock.assert_async().await;
    }
    runtime.shutdown().await;
}

#[tokio::test]
async fn test_consolidated_disabled_goes_straight_to_individual_sources() {
    let mut explorer = ExplorerMock::new().await;
    let consolidated = explorer.ok(explorer_mock::CONSOLIDATED, json!({}), 0).await;
    let _individual = [
        explorer.ok(explorer_mock::BLOCKCHAIN, blockchain_data(), 1).await,
        explorer.ok(explorer_mock::MEMPOOL, mempool_data(), 1).await,
        explorer.ok(explorer_mock::MINING, mining_data(), 1).await,
        explorer.ok(explorer_mock::STAKING, staking_data(), 1).await,
        explorer.ok(explorer_mock::SIDECHAINS, json!({ "chains": [{ "name": "vDEX" }] }), 1).await,
    ];

    let mut config = test_config(&explorer.url());
    config.upstream.use_consolidated = false;
    let runtime = manual_runtime(config);
    let handle = runtime.handle();
    let outcome = handle.refresh_now().await.unwrap();

    assert_eq!(outcome.kind(), Some(CycleKind::Updated));
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.sidechains.len(), 1);
    assert!(snapshot.has(Domain::Staking));
    consolidated.assert_async().await;
    runtime.shutdown().await;
}
