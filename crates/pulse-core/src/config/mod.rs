//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: Hardcoded in struct `Default` implementations
//! 2. **Config file**: TOML file specified by `PULSE_CONFIG` env var
//! 3. **Environment variables**: `PULSE__*` env vars override specific fields
//!
//! # Configuration Sections
//!
//! - [`UpstreamSettings`]: explorer base URL, timeouts, retry policy, endpoint paths
//! - [`PollingPolicy`]: background refresh interval and pause-on-error behaviour
//! - [`EvictionPolicy`]: staleness horizon and sweep period
//! - [`ServerConfig`]: HTTP server settings
//! - [`MetricsConfig`]: Prometheus metrics endpoint
//! - [`LoggingConfig`]: Log level and format
//!
//! # Example
//!
//! ```toml
//! [upstream]
//! base_url = "https://explorer.example.com"
//! request_timeout_ms = 8000
//!
//! [upstream.retry]
//! max_retries = 3
//! backoff = "fixed"
//!
//! [polling]
//! interval_ms = 30000
//! max_consecutive_failures = 5
//!
//! [eviction]
//! max_age_ms = 900000
//! ```

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use url::Url;

use crate::{
    sync::{EvictionPolicy, PollingPolicy},
    upstream::{EndpointPaths, EndpointRegistry, HttpClientConfig, RetryPolicy},
};

/// Upstream explorer API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamSettings {
    /// Origin all endpoint paths resolve against.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-attempt request timeout in milliseconds. Defaults to `10000`.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Maximum concurrent upstream requests for the process. Defaults to `32`.
    #[serde(default = "default_concurrent_limit")]
    pub concurrent_limit: usize,

    /// Try the consolidated source before the individual ones. Defaults to `true`.
    #[serde(default = "default_use_consolidated")]
    pub use_consolidated: bool,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Per-source path overrides.
    #[serde(default)]
    pub endpoints: EndpointPaths,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_concurrent_limit() -> usize {
    32
}

fn default_use_consolidated() -> bool {
    true
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            concurrent_limit: default_concurrent_limit(),
            use_consolidated: default_use_consolidated(),
            retry: RetryPolicy::default(),
            endpoints: EndpointPaths::default(),
        }
    }
}

/// HTTP server configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IP address to bind the server to. Defaults to `127.0.0.1`.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port number to listen on. Must be greater than 0. Defaults to `3030`.
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    /// Maximum number of in-flight API requests. Defaults to `256`.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_port() -> u16 {
    3030
}

fn default_max_concurrent_requests() -> usize {
    256
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

/// Prometheus metrics export configuration.
///
/// When enabled, metrics are exposed at `/metrics` on the server port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether the `/metrics` route is served. Defaults to `true`.
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: default_metrics_enabled() }
    }
}

/// Application logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "trace", "debug", "info", "warn", "error"). Defaults to `"info"`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub upstream: UpstreamSettings,

    #[serde(default)]
    pub polling: PollingPolicy,

    #[serde(default)]
    pub eviction: EvictionPolicy,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Environment variables with the `PULSE__` prefix can override any configuration value.
    /// Use `__` as a separator for nested fields (e.g., `PULSE__POLLING__INTERVAL_MS=5000`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("upstream.base_url", default_base_url())?
            .set_default("upstream.request_timeout_ms", default_request_timeout_ms())?
            .set_default("upstream.use_consolidated", true)?
            .set_default("polling.interval_ms", 60_000)?
            .set_default("polling.max_consecutive_failures", 3)?
            .set_default("polling.pause_on_error", true)?
            .set_default("polling.immediate", true)?
            .set_default("eviction.period_ms", 300_000)?
            .set_default("eviction.max_age_ms", 1_800_000)?
            .set_default("server.bind_address", "127.0.0.1")?
            .set_default("server.bind_port", 3030)?
            .set_default("metrics.enabled", true)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("PULSE").separator("__").try_parsing(true))
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads configuration from `config/config.toml` with fallback to defaults.
    ///
    /// The config file path can be overridden using the `PULSE_CONFIG` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("PULSE_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Returns the parsed socket address for the HTTP server.
    ///
    /// # Errors
    ///
    /// Returns an error string if the address cannot be parsed into a valid [`SocketAddr`].
    ///
    /// [`SocketAddr`]: std::net::SocketAddr
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, String> {
        format!("{}:{}", self.server.bind_address, self.server.bind_port)
            .parse()
            .map_err(|_| {
                format!(
                    "Invalid socket address: {}:{}",
                    self.server.bind_address, self.server.bind_port
                )
            })
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream.request_timeout_ms)
    }

    /// Builds the endpoint registry described by the `upstream` section.
    #[must_use]
    pub fn endpoint_registry(&self) -> EndpointRegistry {
        EndpointRegistry::from_paths(&self.upstream.endpoints, self.upstream.use_consolidated)
    }

    #[must_use]
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig { concurrent_limit: self.upstream.concurrent_limit, ..Default::default() }
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        let upstream = &self.upstream;
        if upstream.base_url.is_empty() {
            return Err("Upstream base URL must not be empty".to_string());
        }
        let base = Url::parse(&upstream.base_url)
            .map_err(|e| format!("Invalid upstream base URL {}: {e}", upstream.base_url))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(format!("Upstream base URL must be http(s): {}", upstream.base_url));
        }
        for (key, path) in upstream.endpoints.iter() {
            if !path.starts_with('/') {
                return Err(format!("Endpoint path for {key} must start with '/': {path}"));
            }
        }

        if upstream.request_timeout_ms == 0 {
            return Err("Upstream request timeout must be greater than 0".to_string());
        }
        if upstream.concurrent_limit == 0 {
            return Err("Upstream concurrent limit must be greater than 0".to_string());
        }
        if upstream.retry.base_delay_ms > upstream.retry.max_delay_ms {
            return Err("Retry base delay must not exceed max delay".to_string());
        }

        if self.polling.interval_ms == 0 {
            return Err("Polling interval must be greater than 0".to_string());
        }
        if self.polling.pause_on_error && self.polling.max_consecutive_failures == 0 {
            return Err(
                "max_consecutive_failures must be greater than 0 when pause_on_error is set"
                    .to_string(),
            );
        }

        if self.eviction.period_ms == 0 {
            return Err("Eviction period must be greater than 0".to_string());
        }
        if self.eviction.max_age_ms == 0 {
            return Err("Eviction max age must be greater than 0".to_string());
        }
        if self.eviction.max_age_ms <= self.polling.interval_ms {
            return Err("Eviction max age must be longer than the polling interval".to_string());
        }

        if self.server.bind_port == 0 {
            return Err("Bind port must be greater than 0".to_string());
        }
        if self.server.max_concurrent_requests == 0 {
            return Err("Max concurrent requests must be greater than 0".to_string());
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }
}
