//! Mock infrastructure for testing Pulse against explorer APIs
//!
//! - `ExplorerMock`: wraps mockito and answers explorer JSON envelopes
//! - Fixtures and runtime helpers shared by the integration suites

pub mod explorer_mock;
pub mod test_helpers;

pub use explorer_mock::ExplorerMock;
pub use test_helpers::*;
