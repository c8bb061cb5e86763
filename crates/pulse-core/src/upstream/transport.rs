//! Transport seam between the fallback composer and the network.
//!
//! [`Transport`] fetches one [`EndpointDescriptor`] and returns its parsed [`Envelope`].
//! [`HttpTransport`] is the production implementation on top of [`HttpClient`]; tests
//! substitute scripted transports to drive the composer deterministically.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use url::Url;

use crate::upstream::{
    http_client::{HttpClient, RetryPolicy},
    registry::EndpointDescriptor,
    UpstreamError,
};

/// Response wrapper shared by every upstream source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Envelope {
    /// A successful envelope carrying `data`.
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    /// A failed envelope with the given upstream error message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(message.into()) }
    }

    /// Unwraps the payload.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::EnvelopeRejected`] if the envelope reports `success=false`
    /// or carries no data.
    pub fn into_data(self) -> Result<Value, UpstreamError> {
        if !self.success {
            let reason = self.error.unwrap_or_else(|| "success=false".to_string());
            return Err(UpstreamError::EnvelopeRejected(reason));
        }
        self.data.ok_or_else(|| UpstreamError::EnvelopeRejected("missing data".to_string()))
    }
}

/// Fetches a single upstream source.
///
/// Implementations own their retry behaviour; a returned error is final for this attempt.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, endpoint: &EndpointDescriptor) -> Result<Envelope, UpstreamError>;
}

/// [`Transport`] issuing HTTP GET requests against a base URL.
pub struct HttpTransport {
    client: Arc<HttpClient>,
    base_url: Url,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpTransport {
    /// Creates a transport rooted at `base_url`.
    ///
    /// Endpoint paths are absolute (`/api/...`) and resolve against the origin of `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::InvalidRequest`] if `base_url` is not an absolute http(s) URL.
    pub fn new(
        client: Arc<HttpClient>,
        base_url: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, UpstreamError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| UpstreamError::InvalidRequest(format!("invalid base url {base_url}: {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(UpstreamError::InvalidRequest(format!(
                "unsupported scheme for base url: {}",
                base_url.scheme()
            )));
        }
        Ok(Self { client, base_url, timeout, retry })
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Resolves an endpoint path against the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::InvalidRequest`] if the path cannot be joined.
    pub fn endpoint_url(&self, endpoint: &EndpointDescriptor) -> Result<Url, UpstreamError> {
        self.base_url.join(&endpoint.path).map_err(|e| {
            UpstreamError::InvalidRequest(format!("invalid path {}: {e}", endpoint.path))
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, endpoint: &EndpointDescriptor) -> Result<Envelope, UpstreamError> {
        let url = self.endpoint_url(endpoint)?;
        let body = self.client.get(&url, self.timeout, &self.retry).await?;
        serde_json::from_slice::<Envelope>(&body)
            .map_err(|e| UpstreamError::InvalidResponse(format!("invalid envelope: {e}")))
    }
}
