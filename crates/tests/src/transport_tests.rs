//! HTTP transport behaviour against a mock explorer: retry budget, cache-busting and
//! envelope handling.

use crate::mock_infrastructure::{explorer_mock, mempool_data, ExplorerMock};
use pulse_core::upstream::{
    Backoff, EndpointDescriptor, EndpointKey, HttpClient, HttpTransport, RetryPolicy, Transport,
    UpstreamError,
};
use std::{sync::Arc, time::Duration};

fn transport(url: &str, max_retries: u32) -> HttpTransport {
    let retry = RetryPolicy { max_retries, base_delay_ms: 5, max_delay_ms: 5, backoff: Backoff::Fixed };
    HttpTransport::new(
        Arc::new(HttpClient::new().expect("client builds")),
        url,
        Duration::from_secs(2),
        retry,
    )
    .expect("valid base url")
}

fn mempool_endpoint() -> EndpointDescriptor {
    EndpointDescriptor::new(EndpointKey::Mempool, explorer_mock::MEMPOOL)
}

#[tokio::test]
async fn test_persistent_server_error_uses_full_retry_budget() {
    let mut explorer = ExplorerMock::new().await;
    let mock = explorer.status(explorer_mock::MEMPOOL, 503, 3).await;

    let result = transport(&explorer.url(), 2).fetch(&mempool_endpoint()).await;

    assert!(matches!(result, Err(UpstreamError::HttpError(503, _))));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mut explorer = ExplorerMock::new().await;
    let mock = explorer.status(explorer_mock::MEMPOOL, 404, 1).await;

    let result = transport(&explorer.url(), 3).fetch(&mempool_endpoint()).await;

    assert!(matches!(result, Err(UpstreamError::HttpError(404, _))));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_every_request_carries_cache_buster() {
    let mut explorer = ExplorerMock::new().await;
    let mock = explorer.ok(explorer_mock::MEMPOOL, mempool_data(), 3).await;
    let transport = transport(&explorer.url(), 0);

    for _ in 0..3 {
        let envelope = transport.fetch(&mempool_endpoint()).await.expect("mock matched");
        assert_eq!(envelope.into_data().unwrap()["size"], 42);
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_envelope_is_not_retried() {
    let mut explorer = ExplorerMock::new().await;
    let mock = explorer.rejected(explorer_mock::MEMPOOL, 1).await;

    let envelope = transport(&explorer.url(), 2).fetch(&mempool_endpoint()).await.unwrap();

    assert!(!envelope.success);
    assert!(matches!(envelope.into_data(), Err(UpstreamError::EnvelopeRejected(_))));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_upstream_fails_after_retries() {
    let result = transport("http://127.0.0.1:1", 1).fetch(&mempool_endpoint()).await;

    assert!(result.is_err());
    assert!(result.unwrap_err().is_transient());
}
