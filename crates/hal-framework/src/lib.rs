//! # hal Framework
//!
//! Higher-level pieces built on top of `hal-core`:
//!
//! - Command helpers: recognising `!command` shaped messages and splitting
//!   arguments
//! - [`Fallback`] handlers for commands nothing understood
//! - Built-in plugins (with the `builtin-plugins` feature), currently the
//!   `pluginmgr` plugin for runtime registration from chat
//!
//! None of this is required by the router; it only needs a [`Fallback`].

pub mod command;
pub mod fallback;

#[cfg(feature = "builtin-plugins")]
pub mod builtin;

pub use command::{DEFAULT_PREFIX, command_name, looks_like_command, shell_split};
pub use fallback::{BoxedFallback, Fallback, NotUnderstood};

#[cfg(feature = "builtin-plugins")]
pub use builtin::{PLUGINMGR, plugin_manager};
