//! # Metrics
//!
//! Prometheus counters, gauges and histograms are recorded through the `metrics` facade
//! on every cycle, upstream request, eviction and scheduler transition. A small set of
//! atomic counters mirrors the totals so they can be read back without parsing the
//! Prometheus exposition (used by the sync-state API and tests).
//!
//! The Prometheus recorder is process-global. The first collector installs it; later
//! collectors share the same handle.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        OnceLock,
    },
    time::Duration,
};

use crate::{
    sync::{CycleKind, SchedulerState, SyncError},
    types::Domain,
    upstream::EndpointKey,
};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub trait MetricsState {
    fn as_metric_str(&self) -> &'static str;
    fn as_gauge_value(&self) -> f64;
}

impl MetricsState for SchedulerState {
    fn as_metric_str(&self) -> &'static str {
        self.as_str()
    }

    fn as_gauge_value(&self) -> f64 {
        match self {
            Self::Paused => 1.0,
            _ => 0.0,
        }
    }
}

impl MetricsState for CycleKind {
    fn as_metric_str(&self) -> &'static str {
        self.as_str()
    }

    fn as_gauge_value(&self) -> f64 {
        match self {
            Self::Updated => 1.0,
            Self::Partial => 0.5,
            Self::Failed => 0.0,
        }
    }
}

fn init_prometheus_recorder() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                let recorder = PrometheusBuilder::new().build_recorder();
                tracing::warn!(
                    error = %e,
                    "using fallback prometheus recorder, metrics may not be globally visible"
                );
                recorder.handle()
            }
        })
        .clone()
}

/// Point-in-time totals since the collector was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub cycles_updated: u64,
    pub cycles_partial: u64,
    pub cycles_failed: u64,
    pub cycles_skipped: u64,
    pub upstream_requests: u64,
    pub upstream_failures: u64,
    pub evictions: u64,
}

#[derive(Default)]
struct Totals {
    cycles_updated: AtomicU64,
    cycles_partial: AtomicU64,
    cycles_failed: AtomicU64,
    cycles_skipped: AtomicU64,
    upstream_requests: AtomicU64,
    upstream_failures: AtomicU64,
    evictions: AtomicU64,
}

pub struct MetricsCollector {
    totals: Totals,
    prometheus_handle: PrometheusHandle,
}

impl MetricsCollector {
    /// # Errors
    ///
    /// Returns an error if the Prometheus recorder cannot be initialized.
    pub fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let prometheus_handle = init_prometheus_recorder();
        Ok(Self { totals: Totals::default(), prometheus_handle })
    }

    /// Records an executed cycle.
    pub fn record_cycle(&self, kind: CycleKind, elapsed: Duration) {
        let total = match kind {
            CycleKind::Updated => &self.totals.cycles_updated,
            CycleKind::Partial => &self.totals.cycles_partial,
            CycleKind::Failed => &self.totals.cycles_failed,
        };
        total.fetch_add(1, Ordering::Relaxed);

        counter!("pulse_cycles_total", "outcome" => kind.as_metric_str()).increment(1);
        histogram!("pulse_cycle_duration_seconds").record(elapsed.as_secs_f64());
        gauge!("pulse_last_cycle_result").set(kind.as_gauge_value());
    }

    /// Records a refresh request rejected by the in-flight gate.
    pub fn record_cycle_skipped(&self) {
        self.totals.cycles_skipped.fetch_add(1, Ordering::Relaxed);
        counter!("pulse_cycles_total", "outcome" => "skipped").increment(1);
    }

    /// Records one upstream fetch after its retries were exhausted or it succeeded.
    pub fn record_upstream_request(
        &self,
        endpoint: EndpointKey,
        error: Option<&SyncError>,
        elapsed: Duration,
    ) {
        self.totals.upstream_requests.fetch_add(1, Ordering::Relaxed);
        let result = match error {
            Some(e) => {
                self.totals.upstream_failures.fetch_add(1, Ordering::Relaxed);
                e.kind()
            }
            None => "ok",
        };

        counter!(
            "pulse_upstream_requests_total",
            "endpoint" => endpoint.as_str(),
            "result" => result
        )
        .increment(1);
        histogram!("pulse_upstream_request_duration_seconds", "endpoint" => endpoint.as_str())
            .record(elapsed.as_secs_f64());
    }

    pub fn record_consecutive_failures(&self, failures: u32) {
        gauge!("pulse_consecutive_failures").set(f64::from(failures));
    }

    pub fn record_eviction(&self, domain: Domain) {
        self.totals.evictions.fetch_add(1, Ordering::Relaxed);
        counter!("pulse_evictions_total", "domain" => domain.as_str()).increment(1);
    }

    pub fn record_scheduler_transition(&self, state: SchedulerState) {
        counter!("pulse_scheduler_transitions_total", "state" => state.as_metric_str())
            .increment(1);
        gauge!("pulse_scheduler_paused").set(state.as_gauge_value());
    }

    #[must_use]
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            cycles_updated: self.totals.cycles_updated.load(Ordering::Relaxed),
            cycles_partial: self.totals.cycles_partial.load(Ordering::Relaxed),
            cycles_failed: self.totals.cycles_failed.load(Ordering::Relaxed),
            cycles_skipped: self.totals.cycles_skipped.load(Ordering::Relaxed),
            upstream_requests: self.totals.upstream_requests.load(Ordering::Relaxed),
            upstream_failures: self.totals.upstream_failures.load(Ordering::Relaxed),
            evictions: self.totals.evictions.load(Ordering::Relaxed),
        }
    }

    /// Renders all recorded metrics in the Prometheus text exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        self.prometheus_handle.render()
    }
}
