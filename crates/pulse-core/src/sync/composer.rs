//! Consolidated-first fetch with per-domain fallback.
//!
//! # Strategy
//!
//! ```text
//! compose()
//!    │
//!    ▼
//! ┌────────────────────┐   usable (≥ MIN_CONSOLIDATED_DOMAINS
//! │ consolidated fetch │ ─────────── recognized domains) ──────► return partial
//! └─────────┬──────────┘
//!           │ transport error / success=false / no recognized domain
//!           ▼
//! ┌────────────────────────────────┐
//! │ all individual fetches at once │ ──► merge successful subset ──► return partial
//! └────────────────────────────────┘
//! ```
//!
//! Every upstream failure ends here as a failed [`FetchOutcome`]; nothing propagates to
//! the caller.

use futures::future::join_all;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{
    metrics::MetricsCollector,
    types::{Domain, DomainPayload, DomainSet, PartialSnapshot},
    upstream::{EndpointDescriptor, EndpointKey, EndpointRegistry, Transport},
};

use super::errors::SyncError;

/// Minimum number of recognized domains a consolidated response must carry to be used
/// without falling back to the individual sources.
pub const MIN_CONSOLIDATED_DOMAINS: usize = 1;

/// Field names of the consolidated `data` object and the domain each one feeds.
const CONSOLIDATED_FIELDS: [(&str, Domain); 6] = [
    ("blockchain", Domain::Chain),
    ("mining", Domain::Mining),
    ("mempool", Domain::Mempool),
    ("network", Domain::Network),
    ("staking", Domain::Staking),
    ("sidechains", Domain::Sidechains),
];

const SIDECHAINS_ALIAS: &str = "pbaas";

/// Result of one upstream fetch attempt, discarded after accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub key: EndpointKey,
    pub ok: bool,
    /// Domains this attempt produced.
    pub domains: DomainSet,
    pub error: Option<SyncError>,
    pub elapsed: Duration,
}

impl FetchOutcome {
    fn success(key: EndpointKey, domains: DomainSet, elapsed: Duration) -> Self {
        Self { key, ok: true, domains, error: None, elapsed }
    }

    fn failure(key: EndpointKey, error: SyncError, elapsed: Duration) -> Self {
        Self { key, ok: false, domains: DomainSet::EMPTY, error: Some(error), elapsed }
    }
}

pub struct FallbackComposer {
    registry: Arc<EndpointRegistry>,
    transport: Arc<dyn Transport>,
    metrics: Arc<MetricsCollector>,
}

impl FallbackComposer {
    #[must_use]
    pub fn new(
        registry: Arc<EndpointRegistry>,
        transport: Arc<dyn Transport>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self { registry, transport, metrics }
    }

    #[must_use]
    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// Runs one fetch round and returns the refreshed domains plus one outcome per attempt.
    ///
    /// Failed domains are absent from the partial, never zeroed.
    pub async fn compose(&self) -> (PartialSnapshot, Vec<FetchOutcome>) {
        let mut outcomes = Vec::with_capacity(1 + self.registry.individual().len());

        if let Some(descriptor) = self.registry.consolidated() {
            let (partial, outcome) = self.fetch_consolidated(descriptor).await;
            outcomes.push(outcome);
            if let Some(partial) = partial {
                return (partial, outcomes);
            }
        }

        let fetches = self.registry.individual().iter().map(|d| self.fetch_individual(d));
        let mut partial = PartialSnapshot::default();
        for (payload, outcome) in join_all(fetches).await {
            if let Some(payload) = payload {
                partial.insert(payload);
            }
            outcomes.push(outcome);
        }

        debug!(
            refreshed = %partial.domains(),
            attempted = self.registry.individual().len(),
            "individual fallback round complete"
        );
        (partial, outcomes)
    }

    async fn fetch_consolidated(
        &self,
        descriptor: &EndpointDescriptor,
    ) -> (Option<PartialSnapshot>, FetchOutcome) {
        let started = Instant::now();
        let result = self.fetch_data(descriptor).await.and_then(decompose_consolidated);
        let elapsed = started.elapsed();

        let (partial, outcome) = match result {
            Ok(partial) => {
                let outcome = FetchOutcome::success(descriptor.key, partial.domains(), elapsed);
                debug!(domains = %outcome.domains, "consolidated source usable");
                (Some(partial), outcome)
            }
            Err(e) => {
                warn!(error = %e, "consolidated source unusable, falling back to individual sources");
                (None, FetchOutcome::failure(descriptor.key, e, elapsed))
            }
        };
        self.metrics.record_upstream_request(descriptor.key, outcome.error.as_ref(), elapsed);
        (partial, outcome)
    }

    async fn fetch_individual(
        &self,
        descriptor: &EndpointDescriptor,
    ) -> (Option<DomainPayload>, FetchOutcome) {
        let started = Instant::now();
        let result = match descriptor.key.domain() {
            Some(domain) => self.fetch_data(descriptor).await.and_then(|data| {
                DomainPayload::decode(domain, data)
                    .map_err(|e| SyncError::malformed(descriptor.key, &e))
            }),
            None => Err(SyncError::Envelope {
                endpoint: descriptor.key,
                message: "endpoint has no individual domain".to_string(),
            }),
        };
        let elapsed = started.elapsed();

        let (payload, outcome) = match result {
            Ok(payload) => {
                let domains = std::iter::once(payload.domain()).collect();
                (Some(payload), FetchOutcome::success(descriptor.key, domains, elapsed))
            }
            Err(e) => {
                debug!(endpoint = %descriptor.key, error = %e, "individual source failed");
                (None, FetchOutcome::failure(descriptor.key, e, elapsed))
            }
        };
        self.metrics.record_upstream_request(descriptor.key, outcome.error.as_ref(), elapsed);
        (payload, outcome)
    }

    async fn fetch_data(&self, descriptor: &EndpointDescriptor) -> Result<Value, SyncError> {
        self.transport
            .fetch(descriptor)
            .await
            .and_then(|envelope| envelope.into_data())
            .map_err(|e| SyncError::from_upstream(descriptor.key, &e))
    }
}

/// Splits a consolidated `data` object into per-domain payloads.
///
/// Individual fields that fail to decode are dropped. The response as a whole is rejected
/// when fewer than [`MIN_CONSOLIDATED_DOMAINS`] recognized domains remain.
fn decompose_consolidated(data: Value) -> Result<PartialSnapshot, SyncError> {
    let Value::Object(mut fields) = data else {
        return Err(SyncError::Envelope {
            endpoint: EndpointKey::Consolidated,
            message: "data is not an object".to_string(),
        });
    };

    let mut partial = PartialSnapshot::default();
    for (field, domain) in CONSOLIDATED_FIELDS {
        let mut value = fields.remove(field);
        if domain == Domain::Sidechains && value.is_none() {
            value = fields.remove(SIDECHAINS_ALIAS);
        }
        let Some(value) = value.filter(|v| !v.is_null()) else {
            continue;
        };

        match DomainPayload::decode(domain, value) {
            Ok(payload) => partial.insert(payload),
            Err(e) => {
                warn!(domain = %domain, error = %e, "dropping malformed domain from consolidated response");
            }
        }
    }

    let usable = recognized_domains(&partial);
    if usable < MIN_CONSOLIDATED_DOMAINS {
        return Err(SyncError::Envelope {
            endpoint: EndpointKey::Consolidated,
            message: format!(
                "{usable} recognized domains, at least {MIN_CONSOLIDATED_DOMAINS} required"
            ),
        });
    }
    Ok(partial)
}

fn recognized_domains(partial: &PartialSnapshot) -> usize {
    let present = partial.domains();
    Domain::RECOGNIZED.into_iter().filter(|d| present.contains(*d)).count()
}
