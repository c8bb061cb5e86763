use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pulse_core::{
    config::AppConfig,
    runtime::{HealthStatus, PulseHandle},
    sync::CycleOutcome,
    types::DomainSet,
    upstream::EndpointKey,
};
use serde::Serialize;
use serde_json::json;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::compression::CompressionLayer;
use tracing::{info, warn};

use crate::middleware::create_request_id_layers;

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub handle: PulseHandle,
    pub metrics_enabled: bool,
}

/// Body of `POST /api/v1/refresh`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub outcome: &'static str,
    pub updated: DomainSet,
    pub failed_sources: Vec<EndpointKey>,
    pub elapsed_ms: u64,
    pub status: HealthStatus,
}

impl RefreshResponse {
    fn new(outcome: &CycleOutcome, status: HealthStatus) -> Self {
        let report = outcome.report();
        Self {
            outcome: outcome.kind().map_or("skipped", |k| k.as_str()),
            updated: report.map_or(DomainSet::EMPTY, |r| r.updated),
            failed_sources: report.map(|r| r.failed_sources().collect()).unwrap_or_default(),
            elapsed_ms: report.map_or(0, |r| u64::try_from(r.elapsed.as_millis()).unwrap_or(u64::MAX)),
            status,
        }
    }
}

/// Builds the service router.
///
/// `/health` and `/metrics` sit outside the concurrency limit so probes keep answering
/// while the API is saturated.
pub fn create_app(handle: PulseHandle, config: &AppConfig) -> Router {
    let state = AppState { handle, metrics_enabled: config.metrics.enabled };
    let (set_request_id, propagate_request_id) = create_request_id_layers();

    let public = Router::new()
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .with_state(state.clone());

    let api = Router::new()
        .route("/api/v1/snapshot", get(handle_snapshot))
        .route("/api/v1/sync-state", get(handle_sync_state))
        .route("/api/v1/refresh", post(handle_refresh))
        .with_state(state)
        .layer(ConcurrencyLimitLayer::new(config.server.max_concurrent_requests))
        .layer(CompressionLayer::new());

    public.merge(api).layer(propagate_request_id).layer(set_request_id)
}

pub async fn handle_snapshot(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.handle.snapshot())
}

pub async fn handle_sync_state(State(state): State<AppState>) -> impl IntoResponse {
    let handle = &state.handle;
    Json(json!({
        "status": handle.status(),
        "scheduler": handle.scheduler_state(),
        "schedulerError": handle.scheduler_error(),
        "sync": handle.sync_state(),
    }))
}

pub async fn handle_refresh(State(state): State<AppState>) -> Response {
    match state.handle.refresh_now().await {
        Ok(outcome) => {
            let body = RefreshResponse::new(&outcome, state.handle.status());
            info!(outcome = body.outcome, updated = %body.updated, "manual refresh finished");
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "manual refresh refused");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": e.to_string() })))
                .into_response()
        }
    }
}

pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let handle = &state.handle;
    let status = handle.status();
    let sync = handle.sync_state();
    let snapshot = handle.snapshot();

    let body = json!({
        "status": status,
        "scheduler": handle.scheduler_state(),
        "schedulerError": handle.scheduler_error(),
        "domains": snapshot.domains(),
        "consecutiveFailures": sync.consecutive_failures,
        "lastSuccessAt": sync.last_success_at,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    let code = if status == HealthStatus::Failing {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(body))
}

pub async fn handle_metrics(State(state): State<AppState>) -> impl IntoResponse {
    if !state.metrics_enabled {
        return (StatusCode::NOT_FOUND, [("content-type", "text/plain")], String::new());
    }
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.handle.render_metrics(),
    )
}
