//! Plugin definitions, instances and the registry that holds them.
//!
//! - [`PluginDefinition`] is reusable handler logic plus a default pattern.
//! - [`Instance`] is a pending binding of a definition to a room; its pattern
//!   and settings can still be changed.
//! - [`PluginInstance`] is the live, immutable binding produced by
//!   registering an [`Instance`] with a [`Registry`].
//!
//! ```text
//! PluginDefinition ──instantiate(room)──► Instance ──register()──► Arc<PluginInstance>
//!                                                                    (in Registry)
//! ```

mod definition;
mod instance;
mod registry;

pub use definition::{CallbackFn, CallbackResult, InitFn, PluginDefinition};
pub use instance::{Instance, PluginInstance};
pub use registry::Registry;
