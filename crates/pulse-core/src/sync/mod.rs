//! Telemetry synchronization: composition, orchestration, scheduling and eviction.
//!
//! ```text
//! SmartScheduler ──► Aggregator ──► FallbackComposer ──► Transport (upstream HTTP)
//!                        │
//!                        ▼
//!                    StateStore ──► consumers (watch / Arc<Snapshot>)
//!                        ▲
//! EvictionSweeper ───────┘ (through Aggregator::evict_stale)
//! ```

pub mod aggregator;
pub mod composer;
pub mod errors;
mod guard;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{Aggregator, CycleOutcome, CycleReport};
pub use composer::{FallbackComposer, FetchOutcome, MIN_CONSOLIDATED_DOMAINS};
pub use errors::SyncError;
pub use scheduler::{PollingPolicy, SchedulerState, SmartScheduler};
pub use state::{CycleKind, SyncState};
pub use store::StateStore;
pub use sweeper::{EvictionPolicy, EvictionSweeper};
