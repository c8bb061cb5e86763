use thiserror::Error;

/// Coarse classification of an upstream failure.
///
/// Both classes are handled identically once they reach a fetch outcome; the split only
/// decides whether the transport retries and how the failure is labelled in metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Network failure, timeout, or non-2xx status.
    Transport,
    /// The response arrived but its envelope or payload is unusable.
    Envelope,
}

impl FailureClass {
    /// Returns a static string representation for metrics labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Envelope => "envelope",
        }
    }
}

/// Errors that can occur when talking to an upstream telemetry source.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum UpstreamError {
    /// Request exceeded the configured timeout duration.
    #[error("Request timeout")]
    Timeout,

    /// Failed to establish a connection to the upstream endpoint.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// HTTP-level error occurred (non-2xx status code).
    ///
    /// First field is the HTTP status code, second is the (truncated) response body.
    #[error("HTTP error: {0}")]
    HttpError(u16, String),

    /// Network-level error from the underlying HTTP client.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body could not be parsed or did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Envelope parsed but reported `success=false` or carried no data.
    #[error("Envelope rejected: {0}")]
    EnvelopeRejected(String),

    /// Request could not be built (bad URL or path).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Maximum concurrent requests limit has been reached.
    #[error("Concurrency limit reached: {0}")]
    ConcurrencyLimit(String),
}

impl UpstreamError {
    /// Returns `true` if this error is transient and the request should be retried.
    ///
    /// Transient errors include timeouts, connection failures, HTTP 5xx and HTTP 429.
    /// Envelope and request errors are deterministic and never retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) | Self::ConnectionFailed(_) => true,
            Self::HttpError(status, _) => (500..=599).contains(status) || *status == 429,
            _ => false,
        }
    }

    /// Classifies this error as a transport or envelope failure.
    #[must_use]
    pub fn class(&self) -> FailureClass {
        match self {
            Self::InvalidResponse(_) | Self::EnvelopeRejected(_) => FailureClass::Envelope,
            _ => FailureClass::Transport,
        }
    }

    /// Returns a static string representation for metrics labels.
    #[must_use]
    pub fn as_metric_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionFailed(_) => "connection_failed",
            Self::HttpError(status, _) if (500..=599).contains(status) => "http_5xx",
            Self::HttpError(..) => "http_4xx",
            Self::Network(_) => "network",
            Self::InvalidResponse(_) => "invalid_response",
            Self::EnvelopeRejected(_) => "envelope_rejected",
            Self::InvalidRequest(_) => "invalid_request",
            Self::ConcurrencyLimit(_) => "concurrency_limit",
        }
    }
}
