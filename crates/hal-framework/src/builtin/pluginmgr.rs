//! `pluginmgr`: attach and detach plugins from chat.
//!
//! ```text
//! !plugin list                   plugins known to the bot
//! !plugin instances              plugins attached to this room
//! !plugin attach <name> [regex]  attach <name> to this room
//! !plugin detach <name>          detach every <name> instance from this room
//! ```
//!
//! `!` stands for the router's command prefix.
//!
//! Attaching is idempotent: asking twice for the same plugin and pattern
//! leaves one instance.

use std::sync::{Arc, Weak};

use hal_core::{CallbackResult, Event, PluginDefinition, PluginError, Registry};
use tracing::warn;

use crate::command::shell_split;

/// Name of the plugin manager definition.
pub const PLUGINMGR: &str = "pluginmgr";

fn synopsis(prefix: &str) -> String {
    format!("{prefix}plugin list | instances | attach <name> [regex] | detach <name>")
}

/// Builds the plugin manager definition bound to `registry`, answering to
/// `<prefix>plugin`.
///
/// The definition only holds a weak reference, so storing it in the same
/// registry does not keep the registry alive.
pub fn plugin_manager(registry: &Arc<Registry>, prefix: &str) -> PluginDefinition {
    let registry: Weak<Registry> = Arc::downgrade(registry);
    let pattern = format!(r"^{}plugin\b", regex::escape(prefix));
    let usage: Arc<str> = format!("usage: {}", synopsis(prefix)).into();

    PluginDefinition::new(PLUGINMGR, pattern, move |event: Event| {
        handle(registry.clone(), Arc::clone(&usage), event)
    })
    .help(synopsis(prefix))
}

async fn handle(registry: Weak<Registry>, usage: Arc<str>, event: Event) -> CallbackResult {
    let Some(registry) = registry.upgrade() else {
        warn!("Registry dropped, ignoring plugin command");
        return Ok(());
    };
    let reply = execute(&registry, &usage, &event);
    event.reply(reply).await?;
    Ok(())
}

/// Runs one plugin command and returns the reply text, or `usage` when the
/// arguments are not understood.
pub fn execute(registry: &Registry, usage: &str, event: &Event) -> String {
    let args = shell_split(event.body());
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        [_, "list"] => list(registry),
        [_, "instances"] => instances(registry, event.room_id()),
        [_, "attach", name] => attach(registry, event.room_id(), name, None),
        [_, "attach", name, regex] => attach(registry, event.room_id(), name, Some(*regex)),
        [_, "detach", name] => detach(registry, event.room_id(), name),
        _ => usage.to_string(),
    }
}

fn list(registry: &Registry) -> String {
    let lines: Vec<String> = registry
        .definitions()
        .iter()
        .map(|def| match def.help_text() {
            Some(help) => format!("{} - {}", def.name(), help),
            None => def.name().to_string(),
        })
        .collect();

    if lines.is_empty() {
        "No plugins registered.".to_string()
    } else {
        lines.join("\n")
    }
}

fn instances(registry: &Registry, room_id: &str) -> String {
    let lines: Vec<String> = registry
        .instances_in_room(room_id)
        .iter()
        .map(ToString::to_string)
        .collect();

    if lines.is_empty() {
        format!("No plugins attached to {room_id}.")
    } else {
        lines.join("\n")
    }
}

fn attach(registry: &Registry, room_id: &str, name: &str, regex: Option<&str>) -> String {
    let Some(definition) = registry.definition(name) else {
        return PluginError::UnknownPlugin(name.to_string()).to_string();
    };

    let mut pending = definition.instantiate(room_id);
    if let Some(regex) = regex {
        pending = pending.regex(regex);
    }

    match registry.register_if_absent(pending) {
        Ok(instance) => format!("Attached {instance}."),
        Err(e) => e.to_string(),
    }
}

fn detach(registry: &Registry, room_id: &str, name: &str) -> String {
    let found = registry.find_instances(room_id, name);
    if found.is_empty() {
        return format!("{name} is not attached to {room_id}.");
    }

    let mut removed = 0;
    for instance in &found {
        match registry.unregister(instance) {
            Ok(()) => removed += 1,
            // Detached concurrently; nothing left to do.
            Err(PluginError::InstanceNotFound { .. }) => {}
            Err(e) => return e.to_string(),
        }
    }
    format!("Detached {removed} instance(s) of {name} from {room_id}.")
}
