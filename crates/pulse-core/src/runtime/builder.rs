//! Builder pattern for initializing the Pulse runtime with configurable components.

use crate::{
    config::AppConfig,
    metrics::MetricsCollector,
    sync::{Aggregator, EvictionSweeper, FallbackComposer, SmartScheduler, StateStore},
    upstream::{HttpClient, HttpTransport, Transport, UpstreamError},
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{lifecycle::PulseRuntime, PulseComponents};

/// Errors that can occur during runtime initialization.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// Metrics collector initialization failed
    #[error("Failed to initialize metrics collector: {0}")]
    MetricsInitialization(String),

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// The HTTP client or transport could not be constructed
    #[error("Failed to initialize upstream transport: {0}")]
    Transport(#[from] UpstreamError),
}

/// Configuration options for the runtime builder.
#[derive(Clone)]
struct RuntimeOptions {
    enable_scheduler: bool,
    enable_sweeper: bool,
    shutdown_channel_capacity: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self { enable_scheduler: true, enable_sweeper: true, shutdown_channel_capacity: 16 }
    }
}

/// Builder for constructing a [`PulseRuntime`].
///
/// Background polling and eviction are on by default. A custom [`Transport`] replaces the
/// HTTP transport that would otherwise be built from the `upstream` configuration.
///
/// # Examples
///
/// ```no_run
/// # use pulse_core::{config::AppConfig, runtime::PulseRuntimeBuilder};
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let runtime = PulseRuntimeBuilder::new()
///     .with_config(AppConfig::load()?)
///     .disable_sweeper()
///     .with_shutdown_channel_capacity(4)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct PulseRuntimeBuilder {
    config: Option<AppConfig>,
    transport: Option<Arc<dyn Transport>>,
    options: RuntimeOptions,
}

impl PulseRuntimeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self { config: None, transport: None, options: RuntimeOptions::default() }
    }

    #[must_use]
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses `transport` for every upstream fetch instead of building an HTTP transport.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn enable_scheduler(mut self) -> Self {
        self.options.enable_scheduler = true;
        self
    }

    /// Disables automatic polling. Refreshes then only happen through the handle.
    #[must_use]
    pub fn disable_scheduler(mut self) -> Self {
        self.options.enable_scheduler = false;
        self
    }

    #[must_use]
    pub fn enable_sweeper(mut self) -> Self {
        self.options.enable_sweeper = true;
        self
    }

    #[must_use]
    pub fn disable_sweeper(mut self) -> Self {
        self.options.enable_sweeper = false;
        self
    }

    /// Sets custom shutdown channel capacity (default: 16).
    #[must_use]
    pub fn with_shutdown_channel_capacity(mut self, capacity: usize) -> Self {
        self.options.shutdown_channel_capacity = capacity;
        self
    }

    /// Builds the runtime and starts the enabled background tasks.
    ///
    /// Must be called from within a Tokio runtime. A missing configuration falls back to
    /// [`AppConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError`] if the configuration is invalid, the metrics collector
    /// cannot be created, or the HTTP transport cannot be built.
    pub fn build(self) -> Result<PulseRuntime, BuilderError> {
        let config = self.config.unwrap_or_default();
        config.validate().map_err(BuilderError::ConfigValidation)?;

        info!(
            base_url = %config.upstream.base_url,
            use_consolidated = config.upstream.use_consolidated,
            scheduler_enabled = self.options.enable_scheduler,
            sweeper_enabled = self.options.enable_sweeper,
            "initializing pulse runtime"
        );

        let (shutdown_tx, _) = broadcast::channel::<()>(self.options.shutdown_channel_capacity);

        let metrics_collector = Arc::new(
            MetricsCollector::new()
                .map_err(|e| BuilderError::MetricsInitialization(e.to_string()))?,
        );
        debug!("metrics collector initialized");

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let client = Arc::new(HttpClient::with_config(config.http_client_config())?);
                Arc::new(HttpTransport::new(
                    client,
                    &config.upstream.base_url,
                    config.request_timeout(),
                    config.upstream.retry.clone(),
                )?)
            }
        };
        debug!("upstream transport initialized");

        let registry = Arc::new(config.endpoint_registry());
        let composer = FallbackComposer::new(registry, transport, metrics_collector.clone());
        let store = Arc::new(StateStore::new());
        let aggregator =
            Arc::new(Aggregator::new(composer, store.clone(), metrics_collector.clone()));
        let scheduler = Arc::new(SmartScheduler::new(
            aggregator.clone(),
            config.polling.clone(),
            metrics_collector.clone(),
        ));
        let sweeper = Arc::new(EvictionSweeper::new(aggregator.clone(), config.eviction.clone()));
        debug!("sync components initialized");

        let components =
            PulseComponents::new(metrics_collector, store, aggregator, scheduler, sweeper);
        let runtime = PulseRuntime::new(
            components,
            shutdown_tx,
            config,
            self.options.enable_scheduler,
            self.options.enable_sweeper,
        );

        info!("pulse runtime initialization complete");

        Ok(runtime)
    }
}

impl Default for PulseRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
