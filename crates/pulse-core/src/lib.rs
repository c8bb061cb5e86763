//! # Pulse Core
//!
//! Network telemetry synchronization and aggregation engine.
//!
//! Pulse gathers blockchain, mining, mempool, network, staking and sidechain statistics
//! from a set of upstream explorer endpoints, merges them into one snapshot, and keeps that
//! snapshot fresh while individual sources come and go.
//!
//! - **[`upstream`]**: endpoint registry, retrying HTTP client with cache-busting, and the
//!   [`Transport`](upstream::Transport) seam.
//!
//! - **[`sync`]**: fallback composer, refresh orchestrator with an in-flight gate, polling
//!   scheduler with pause-on-error, state store and eviction sweeper.
//!
//! - **[`runtime`]**: wires the components together, owns background tasks, and hands out
//!   [`PulseHandle`](runtime::PulseHandle)s to consumers.
//!
//! - **[`metrics`]**: Prometheus metrics collection for monitoring and observability.
//!
//! - **[`config`]**: layered configuration (defaults, TOML file, environment).
//!
//! ## Refresh Flow
//!
//! ```text
//! SmartScheduler / PulseHandle::refresh_now
//!       │
//!       ▼
//! ┌──────────────┐
//! │  Aggregator  │ ─── cycle in flight ──► Skipped
//! │ (dedup gate) │
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────────┐
//! │ FallbackComposer │
//! └────────┬─────────┘
//!          │
//!    consolidated ok? ── yes ──► decompose into domains
//!          │ no
//!          ▼
//!   individual sources (concurrent)
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   StateStore    │ ──► watch subscribers
//! │ (merge fields)  │
//! └─────────────────┘
//! ```

pub mod config;
pub mod metrics;
pub mod runtime;
pub mod sync;
pub mod types;
pub mod upstream;
