//! Scripted in-memory transport and payload fixtures for sync tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc, time::Duration};

use crate::{
    metrics::MetricsCollector,
    upstream::{EndpointDescriptor, EndpointKey, EndpointRegistry, Envelope, Transport, UpstreamError},
};

use super::{aggregator::Aggregator, composer::FallbackComposer, store::StateStore};

/// What a scripted endpoint answers.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Data(Value),
    Rejected,
    Status(u16),
    Panic,
}

/// Transport answering from a per-key script. Unscripted keys answer HTTP 503.
pub(crate) struct ScriptedTransport {
    replies: Mutex<HashMap<EndpointKey, Reply>>,
    calls: Mutex<Vec<EndpointKey>>,
    delay: Duration,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self { replies: Mutex::new(HashMap::new()), calls: Mutex::new(Vec::new()), delay: Duration::ZERO }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn reply(self, key: EndpointKey, reply: Reply) -> Self {
        self.set(key, reply);
        self
    }

    pub(crate) fn set(&self, key: EndpointKey, reply: Reply) {
        self.replies.lock().insert(key, reply);
    }

    pub(crate) fn calls(&self) -> Vec<EndpointKey> {
        self.calls.lock().clone()
    }

    pub(crate) fn call_count(&self, key: EndpointKey) -> usize {
        self.calls.lock().iter().filter(|k| **k == key).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, endpoint: &EndpointDescriptor) -> Result<Envelope, UpstreamError> {
        self.calls.lock().push(endpoint.key);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self.replies.lock().get(&endpoint.key).cloned();
        match reply {
            Some(Reply::Data(data)) => Ok(Envelope::ok(data)),
            Some(Reply::Rejected) => Ok(Envelope::failed("daemon unavailable")),
            Some(Reply::Panic) => panic!("scripted panic on {}", endpoint.key),
            Some(Reply::Status(status)) => Err(UpstreamError::HttpError(status, String::new())),
            None => Err(UpstreamError::HttpError(503, String::new())),
        }
    }
}

pub(crate) fn blockchain_data() -> Value {
    json!({ "blocks": 3_210_000, "headers": 3_210_000, "bestblockhash": "00a1", "chain": "main" })
}

pub(crate) fn mining_data() -> Value {
    json!({ "difficulty": 1.25e12, "networkhashps": 9.8e12 })
}

pub(crate) fn mempool_data() -> Value {
    json!({ "size": 42, "bytes": 18_000 })
}

pub(crate) fn staking_data() -> Value {
    json!({ "networkWeight": 5.1e7, "apy": 6.4 })
}

pub(crate) fn network_data() -> Value {
    json!({ "connections": 16, "subversion": "/Verus:1.2.5/" })
}

pub(crate) fn sidechains_data() -> Value {
    json!([{ "name": "vDEX", "currencyid": "iHax5qYQGbcMGqJKKrPorpzUBX2oFFXGnY" }])
}

pub(crate) fn composer(transport: &Arc<ScriptedTransport>) -> FallbackComposer {
    FallbackComposer::new(
        Arc::new(EndpointRegistry::default()),
        transport.clone(),
        Arc::new(MetricsCollector::new().unwrap()),
    )
}

pub(crate) fn aggregator(transport: &Arc<ScriptedTransport>) -> Arc<Aggregator> {
    Arc::new(Aggregator::new(
        composer(transport),
        Arc::new(StateStore::new()),
        Arc::new(MetricsCollector::new().unwrap()),
    ))
}
