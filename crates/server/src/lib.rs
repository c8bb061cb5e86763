//! HTTP service host for the Pulse engine.

pub mod middleware;
pub mod router;
