//! Integration tests for the Pulse telemetry engine
//!
//! - `transport_tests`: retry budget, cache-busting and envelope handling over HTTP
//! - `sync_tests`: consolidated, fallback, partial and total-failure cycles end to end
//! - `runtime_tests`: background polling, pause-on-error, dedup and shutdown
//! - `server_tests`: service routes backed by a live runtime
//! - `mock_infrastructure`: mockito explorer mock and fixtures
//!
//! ```bash
//! cargo test --package tests
//! ```

#[cfg(test)]
mod transport_tests;

#[cfg(test)]
mod sync_tests;

#[cfg(test)]
mod runtime_tests;

#[cfg(test)]
mod server_tests;

/// Mock infrastructure for testing
pub mod mock_infrastructure;
