//! Built-in plugins shipped with the hal framework.
//!
//! These plugins are enabled by the `builtin-plugins` feature flag (on by
//! default).
//!
//! | Plugin | Pattern | Description |
//! |--------|---------|-------------|
//! | [`PLUGINMGR`] | `^<prefix>plugin` | List, attach and detach plugins from chat |
//!
//! # Loading built-in plugins
//!
//! ```rust,ignore
//! use hal_framework::builtin::plugin_manager;
//!
//! let def = runtime.register_plugin(plugin_manager(runtime.registry(), "!"));
//! runtime.attach(def.name(), "lobby")?;
//! ```
//!
//! Alternatively, call `HalRuntime::load_builtin_plugins` to register all
//! built-in plugins at once.

pub mod pluginmgr;

pub use pluginmgr::{PLUGINMGR, plugin_manager};
