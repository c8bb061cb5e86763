use bytes::Bytes;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

use crate::upstream::UpstreamError;

/// Maximum number of response body characters kept in an [`UpstreamError::HttpError`].
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Keeps at most [`MAX_ERROR_BODY_CHARS`] characters of an error body.
fn truncate_error_body(text: String) -> String {
    match text.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}... (truncated)", &text[..cut]),
        None => text,
    }
}

/// Configuration for HTTP client concurrency and timeout behavior.
///
/// Controls semaphore-based concurrency limiting with adaptive timeouts
/// based on permit availability.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum number of concurrent HTTP requests allowed
    pub concurrent_limit: usize,
    /// Permit acquisition timeout in milliseconds under normal load
    pub permit_timeout_ms: u64,
    /// Permit acquisition timeout in milliseconds when permits are scarce
    pub permit_timeout_scarce_ms: u64,
    /// Number of available permits below which they are considered scarce
    pub scarce_permit_threshold: usize,
    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            concurrent_limit: 32,
            permit_timeout_ms: 2_000,
            permit_timeout_scarce_ms: 500,
            scarce_permit_threshold: 4,
            connect_timeout_ms: 5_000,
        }
    }
}

/// Delay growth between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Every retry waits `base_delay_ms`.
    Fixed,
    /// Retry `n` waits `base_delay_ms * 2^(n-1)`.
    Exponential,
}

/// Retry budget applied to a single upstream call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` disables retrying.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any single retry delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff")]
    pub backoff: Backoff,
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    2_000
}

fn default_backoff() -> Backoff {
    Backoff::Exponential
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff: default_backoff(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    /// Returns the delay to wait before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let millis = match self.backoff {
            Backoff::Fixed => self.base_delay_ms,
            Backoff::Exponential => {
                let shift = retry.saturating_sub(1).min(16);
                self.base_delay_ms.saturating_mul(1 << shift)
            }
        };
        Duration::from_millis(millis.min(self.max_delay_ms))
    }

    /// Total number of attempts this policy allows for one call.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Produces strictly increasing millisecond timestamps for cache-busting query parameters.
#[derive(Debug, Default)]
pub struct CacheBuster {
    last: AtomicU64,
}

impl CacheBuster {
    /// Query parameter appended to every upstream request.
    pub const PARAM: &'static str = "_t";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next token: wall-clock millis, bumped past the previous token if needed.
    pub fn next_token(&self) -> u64 {
        #[allow(clippy::cast_possible_truncation)]
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or_else(|last| last);
        now.max(prev + 1)
    }

    /// Returns a copy of `url` with the cache-busting parameter appended.
    #[must_use]
    pub fn apply(&self, url: &Url) -> Url {
        let mut busted = url.clone();
        busted.query_pairs_mut().append_pair(Self::PARAM, &self.next_token().to_string());
        busted
    }
}

/// HTTP client with semaphore-based concurrency control.
///
/// Manages a pool of HTTP connections with configurable concurrency limits,
/// cache-busting on every request and retry logic driven by a caller-supplied
/// [`RetryPolicy`].
pub struct HttpClient {
    client: Client,
    concurrent_limit: Arc<Semaphore>,
    cache_buster: CacheBuster,
    config: HttpClientConfig,
}

/// RAII guard ensuring semaphore permits are always released.
///
/// Uses [`OwnedSemaphorePermit`] which owns an `Arc` to the semaphore,
/// making it safe to hold across async boundaries.
struct PermitGuard {
    _permit: OwnedSemaphorePermit,
    semaphore: Arc<Semaphore>,
}

impl PermitGuard {
    fn new(permit: OwnedSemaphorePermit, semaphore: Arc<Semaphore>) -> Self {
        Self { _permit: permit, semaphore }
    }

    fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        tracing::trace!(
            available_permits = self.semaphore.available_permits(),
            "permit guard dropped"
        );
    }
}

// Default is not implemented because building the reqwest client can fail.

impl HttpClient {
    /// Creates a new HTTP client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn new() -> Result<Self, UpstreamError> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Sanitizes network errors to prevent information disclosure.
    fn sanitize_network_error(error: &reqwest::Error) -> String {
        if error.is_connect() {
            "connection refused or unreachable".to_string()
        } else if error.is_timeout() {
            "connection timed out".to_string()
        } else if error.is_request() {
            "request failed".to_string()
        } else if error.is_body() {
            "response body error".to_string()
        } else if error.is_decode() {
            "response decode error".to_string()
        } else if error.is_redirect() {
            "too many redirects".to_string()
        } else {
            "network error".to_string()
        }
    }

    /// Creates a new HTTP client with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn with_config(config: HttpClientConfig) -> Result<Self, UpstreamError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(config.concurrent_limit)
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .use_rustls_tls()
            .user_agent(concat!("pulse/", env!("CARGO_PKG_VERSION")))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                UpstreamError::ConnectionFailed(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self {
            client,
            concurrent_limit: Arc::new(Semaphore::new(config.concurrent_limit)),
            cache_buster: CacheBuster::new(),
            config,
        })
    }

    /// Waits for a concurrency permit, with a shorter timeout when permits are scarce.
    async fn acquire_permit(&self, url: &Url) -> Result<PermitGuard, UpstreamError> {
        let permit_timeout =
            if self.concurrent_limit.available_permits() < self.config.scarce_permit_threshold {
                Duration::from_millis(self.config.permit_timeout_scarce_ms)
            } else {
                Duration::from_millis(self.config.permit_timeout_ms)
            };

        let permit = tokio::time::timeout(
            permit_timeout,
            Arc::clone(&self.concurrent_limit).acquire_owned(),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                url = %url,
                available_permits = self.concurrent_limit.available_permits(),
                "http client semaphore acquisition timeout"
            );
            UpstreamError::Timeout
        })?
        .map_err(|_| {
            tracing::warn!(
                url = %url,
                available_permits = self.concurrent_limit.available_permits(),
                "http client concurrency limit reached"
            );
            UpstreamError::ConcurrencyLimit(url.to_string())
        })?;

        Ok(PermitGuard::new(permit, self.concurrent_limit.clone()))
    }

    /// Sends an HTTP GET request with concurrency control, cache-busting and retries.
    ///
    /// Transient failures (see [`UpstreamError::is_transient`]) are retried according to
    /// `retry`; every attempt carries a fresh cache-busting token. Each attempt holds its
    /// own permit, released before the backoff sleep.
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::Timeout`] if permit acquisition or the final attempt times out
    /// - [`UpstreamError::ConcurrencyLimit`] if the semaphore is closed
    /// - [`UpstreamError::HttpError`] for non-success HTTP status codes
    /// - [`UpstreamError::ConnectionFailed`] for network-related failures
    pub async fn get(
        &self,
        url: &Url,
        timeout: Duration,
        retry: &RetryPolicy,
    ) -> Result<Bytes, UpstreamError> {
        let mut retries = 0;

        loop {
            let error = {
                let permit_guard = self.acquire_permit(url).await?;
                tracing::trace!(
                    available_permits = permit_guard.available_permits(),
                    attempt = retries + 1,
                    "http request started"
                );

                let result = self
                    .client
                    .get(self.cache_buster.apply(url))
                    .header("accept", "application/json")
                    .header("cache-control", "no-cache")
                    .timeout(timeout)
                    .send()
                    .await;

                match result {
                    Ok(response) if response.status().is_success() => {
                        let body = response.bytes().await.map_err(UpstreamError::Network);
                        tracing::trace!(
                            available_permits = permit_guard.available_permits(),
                            "http request completed"
                        );
                        return body;
                    }
                    Ok(response) => {
                        let status = response.status().as_u16();
                        let raw_text = response.text().await.unwrap_or_default();
                        UpstreamError::HttpError(status, truncate_error_body(raw_text))
                    }
                    Err(e) if e.is_timeout() => UpstreamError::Timeout,
                    Err(e) => UpstreamError::ConnectionFailed(Self::sanitize_network_error(&e)),
                }
            };

            if error.is_transient() && retries < retry.max_retries {
                retries += 1;
                let delay = retry.delay_for(retries);
                tracing::debug!(
                    url = %url,
                    retry = retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "retrying upstream request"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            tracing::trace!(
                available_permits = self.concurrent_limit.available_permits(),
                retries = retries,
                "http request failed"
            );
            return Err(error);
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.concurrent_limit.available_permits()
    }
}
