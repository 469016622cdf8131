//! # hal
//!
//! A chat bot framework: messages from any number of chat services
//! ("brokers") are routed to plugins bound to rooms, and plugins reply
//! through the broker the message came from.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐     ┌────────┐     ┌─────────────────────────────────────┐
//! │ Broker A │────▶│        │────▶│ dispatch task (snapshot of instances)│──▶ echo@lobby
//! └──────────┘     │ Router │     └─────────────────────────────────────┘──▶ pager@ops
//! ┌──────────┐     │        │     ┌─────────────────────────────────────┐
//! │ Broker B │────▶│        │────▶│ dispatch task                       │──▶ ...
//! └──────────┘     └────────┘     └─────────────────────────────────────┘
//! ```
//!
//! - **Brokers**: chat service integrations implementing [`core::Broker`]
//! - **Plugin definitions**: named logic with a default pattern
//! - **Plugin instances**: a definition bound to one room, live in the
//!   [`core::Registry`] and changeable while the bot runs
//! - **Router**: fans in every broker and dispatches each event to the
//!   instances whose room and pattern match
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hal::prelude::*;
//!
//! async fn echo(event: Event) -> CallbackResult {
//!     let text = event.body().trim_start_matches("!echo").trim().to_string();
//!     event.reply(text).await?;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HalRuntime::new();
//!     runtime.register_plugin(PluginDefinition::new("echo", "^!echo", echo));
//!     runtime.add_configured_broker::<ConsoleBroker>()?;
//!     runtime.attach("echo", "lobby")?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `builtin-plugins`: the `pluginmgr` plugin (default)
//! - `toml-config` / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output
//! - `broker-console`: the stdin/stdout broker (default)

pub use hal_core as core;
pub use hal_framework as framework;
pub use hal_runtime as runtime;

#[cfg(feature = "broker-console")]
pub use hal_broker_console as console;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use hal::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use hal_runtime::{HalRuntime, RuntimeError, RuntimeResult};

    // Events and brokers
    pub use hal_core::{
        BoxError, Broker, BoxedBroker, BrokerError, BrokerResult, ConfigurableBroker, Event,
    };

    // Plugins
    pub use hal_core::{CallbackResult, PluginDefinition, PluginInstance, Registry};

    // Unmatched commands
    pub use hal_framework::{Fallback, NotUnderstood};

    #[cfg(feature = "builtin-plugins")]
    pub use hal_framework::plugin_manager;

    #[cfg(feature = "broker-console")]
    pub use hal_broker_console::{ConsoleBroker, ConsoleConfig};
}
