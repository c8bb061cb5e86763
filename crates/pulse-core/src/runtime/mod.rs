//! Pulse runtime initialization and lifecycle management.
//!
//! The runtime wires every engine component together, owns the background scheduler and
//! eviction tasks, and coordinates graceful shutdown. Consumers never touch the components
//! directly: they receive a cloneable [`PulseHandle`].
//!
//! # Examples
//!
//! ## Service Usage
//!
//! ```no_run
//! use pulse_core::{config::AppConfig, runtime::PulseRuntime};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!
//!     let runtime = PulseRuntime::builder().with_config(config).build()?;
//!     let handle = runtime.handle();
//!
//!     // ... hand `handle` to HTTP routes ...
//!
//!     runtime.wait_for_shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Embedded Usage
//!
//! ```no_run
//! use pulse_core::{config::AppConfig, runtime::PulseRuntime};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = PulseRuntime::builder()
//!         .with_config(AppConfig::load()?)
//!         .disable_scheduler()
//!         .build()?;
//!
//!     let handle = runtime.handle();
//!     handle.refresh_now().await?;
//!     println!("{:?}", handle.snapshot().chain);
//!
//!     runtime.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod components;
pub mod handle;
pub mod lifecycle;

pub use builder::{BuilderError, PulseRuntimeBuilder};
pub use components::PulseComponents;
pub use handle::{EngineError, HealthStatus, PulseHandle};
pub use lifecycle::PulseRuntime;
