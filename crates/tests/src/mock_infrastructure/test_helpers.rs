//! Payload fixtures and runtime configuration for integration tests.

use pulse_core::{
    config::AppConfig,
    runtime::{PulseRuntime, PulseRuntimeBuilder},
    upstream::{Backoff, RetryPolicy},
};
use serde_json::{json, Value};

#[must_use]
pub fn blockchain_data() -> Value {
    json!({ "blocks": 3_210_000, "headers": 3_210_000, "bestblockhash": "00a1", "chain": "main" })
}

#[must_use]
pub fn mining_data() -> Value {
    json!({ "difficulty": 1.25e12, "networkhashps": 9.8e12 })
}

#[must_use]
pub fn mempool_data() -> Value {
    json!({ "size": 42, "bytes": 18_000 })
}

#[must_use]
pub fn staking_data() -> Value {
    json!({ "networkWeight": 5.1e7, "apy": 6.4 })
}

#[must_use]
pub fn network_data() -> Value {
    json!({ "connections": 16 })
}

/// Config pointing at `base_url` with fast, fixed retries.
#[must_use]
pub fn test_config(base_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.upstream.base_url = base_url.to_string();
    config.upstream.request_timeout_ms = 2_000;
    config.upstream.retry =
        RetryPolicy { max_retries: 0, base_delay_ms: 10, max_delay_ms: 10, backoff: Backoff::Fixed };
    config
}

/// Runtime with no background tasks; cycles only run through `refresh_now`.
///
/// # Panics
///
/// Panics if the runtime cannot be built.
#[must_use]
pub fn manual_runtime(config: AppConfig) -> PulseRuntime {
    PulseRuntimeBuilder::new()
        .with_config(config)
        .disable_scheduler()
        .disable_sweeper()
        .build()
        .expect("runtime builds")
}
