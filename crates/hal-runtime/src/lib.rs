//! hal Runtime - routing and orchestration for the hal chat bot framework.
//!
//! This crate provides:
//! - The event [`Router`]: fan-in from every attached broker, one dispatch
//!   task per event, a failure boundary around every plugin callback
//! - Runtime orchestration ([`HalRuntime`])
//! - Configuration loading ([`config`]) and logging setup ([`logging`])
//!
//! ```ignore
//! use hal_runtime::HalRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HalRuntime::new();
//!
//!     runtime.register_plugin(echo());
//!     runtime.add_configured_broker::<ConsoleBroker>()?;
//!     runtime.load_instances()?;
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod forward;
pub mod logging;
pub mod router;
pub mod runtime;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, HalConfig, RouterConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use router::{DispatchReport, Router};
pub use runtime::{HalRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
