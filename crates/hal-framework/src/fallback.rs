//! Handlers for command-shaped messages nothing matched.
//!
//! When an event matches no instance and looks like a command, the router
//! hands it to a [`Fallback`]. The default, [`NotUnderstood`], tells the user
//! the command was not understood and which plugins the room does have.
//!
//! Fallbacks are best effort: the router logs a returned error and moves on.

use std::sync::Arc;

use async_trait::async_trait;
use hal_core::{BoxError, Event, Registry};

use crate::command::command_name;

/// Handles command-shaped events that matched no plugin instance.
#[async_trait]
pub trait Fallback: Send + Sync {
    /// Handles one unmatched event. `prefix` is the router's command prefix.
    async fn handle(&self, event: Event, prefix: &str) -> Result<(), BoxError>;
}

/// A shared fallback trait object.
pub type BoxedFallback = Arc<dyn Fallback>;

/// Replies that the command was not understood.
///
/// With a registry attached, the reply also lists the plugins bound to the
/// room, so a typo can be spotted.
#[derive(Default)]
pub struct NotUnderstood {
    registry: Option<Arc<Registry>>,
}

impl NotUnderstood {
    /// A fallback that only reports the unknown command.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fallback that also lists the plugins bound to the room.
    pub fn with_registry(registry: Arc<Registry>) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    /// The text sent back for `event`.
    pub fn message(&self, event: &Event, prefix: &str) -> String {
        let command = command_name(event.body(), prefix).unwrap_or_else(|| event.body().trim());
        let mut text = format!("Sorry, I don't understand `{prefix}{command}`.");

        if let Some(registry) = &self.registry {
            let mut names: Vec<String> = registry
                .instances_in_room(event.room_id())
                .iter()
                .map(|i| i.name().to_string())
                .collect();
            names.sort();
            names.dedup();
            if !names.is_empty() {
                text.push_str(&format!(" Plugins in this room: {}.", names.join(", ")));
            }
        }

        text
    }
}

#[async_trait]
impl Fallback for NotUnderstood {
    async fn handle(&self, event: Event, prefix: &str) -> Result<(), BoxError> {
        let text = self.message(&event, prefix);
        event.reply(text).await?;
        Ok(())
    }
}
