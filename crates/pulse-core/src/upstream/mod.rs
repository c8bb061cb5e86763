//! Upstream telemetry source access.
//!
//! This module handles communication with the explorer API that serves telemetry:
//! - Static endpoint registry (consolidated + individual sources)
//! - HTTP client with concurrency limiting, cache-busting and explicit retry policy
//! - The [`Transport`] seam used by the fallback composer
//! - Error classification into transport and envelope failures

pub mod errors;
pub mod http_client;
pub mod registry;
pub mod transport;

pub use errors::{FailureClass, UpstreamError};
pub use http_client::{Backoff, CacheBuster, HttpClient, HttpClientConfig, RetryPolicy};
pub use registry::{EndpointDescriptor, EndpointKey, EndpointPaths, EndpointRegistry};
pub use transport::{Envelope, HttpTransport, Transport};
