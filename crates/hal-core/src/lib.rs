//! # hal Core
//!
//! The core of the hal chat bot framework: the event model, the broker seam
//! and the plugin registry.
//!
//! - **Events**: one concrete [`Event`] type for every chat service, always
//!   carrying its origin [`Broker`] so plugins can [`reply`](Event::reply).
//! - **Brokers**: the [`Broker`] trait each chat integration implements.
//! - **Plugins**: [`PluginDefinition`]s (logic + default pattern), bound to
//!   rooms as [`PluginInstance`]s and kept live in a [`Registry`].
//!
//! The router that ties these together lives in `hal-runtime`.
//!
//! ```text
//! ┌────────┐  Event  ┌────────┐ snapshot ┌──────────┐
//! │ Broker │────────▶│ Router │─────────▶│ Registry │
//! └────────┘         └────────┘          └──────────┘
//!     ▲                  │ matched instances
//!     │   reply          ▼
//!     └──────────── plugin callback
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use hal_core::{Event, PluginDefinition, Registry};
//!
//! let registry = Registry::new();
//! let echo = registry.register_definition(PluginDefinition::new(
//!     "echo",
//!     "^!echo",
//!     |event: Event| async move {
//!         let text = event.body().trim_start_matches("!echo").trim();
//!         event.reply(text).await?;
//!         Ok(())
//!     },
//! ));
//!
//! echo.instantiate("lobby").register(&registry)?;
//! ```

pub mod broker;
pub mod error;
pub mod event;
pub mod plugin;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

pub use broker::{Broker, BoxedBroker, ConfigurableBroker};
pub use error::{BoxError, BrokerError, BrokerResult, PluginError, PluginResult};
pub use event::{Event, Original};
pub use plugin::{
    CallbackFn, CallbackResult, InitFn, Instance, PluginDefinition, PluginInstance, Registry,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::broker::{Broker, BoxedBroker};
    pub use super::error::{BoxError, BrokerError, BrokerResult};
    pub use super::event::Event;
    pub use super::plugin::{PluginDefinition, PluginInstance, Registry};
}
