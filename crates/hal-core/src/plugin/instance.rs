use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{PluginError, PluginResult};
use crate::event::Event;
use crate::plugin::definition::PluginDefinition;
use crate::plugin::registry::Registry;

/// A pending binding of a plugin definition to a room.
///
/// Created by [`PluginDefinition::instantiate`]. The pattern starts out as the
/// definition's default and can be overridden until the instance is
/// registered; after that the compiled pattern is fixed.
#[derive(Debug, Clone)]
pub struct Instance {
    definition: Arc<PluginDefinition>,
    room_id: String,
    regex: String,
    settings: Map<String, Value>,
}

impl Instance {
    pub(crate) fn new(definition: Arc<PluginDefinition>, room_id: String) -> Self {
        let regex = definition.regex().to_string();
        Self {
            definition,
            room_id,
            regex,
            settings: Map::new(),
        }
    }

    /// Overrides the pattern. An empty pattern matches every message.
    pub fn regex(mut self, regex: impl Into<String>) -> Self {
        self.regex = regex.into();
        self
    }

    /// Adds one setting.
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Replaces all settings.
    pub fn settings(mut self, settings: Map<String, Value>) -> Self {
        self.settings = settings;
        self
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn pattern(&self) -> &str {
        &self.regex
    }

    /// Registers this instance, making it live. See [`Registry::register`].
    pub fn register(self, registry: &Registry) -> PluginResult<Arc<PluginInstance>> {
        registry.register(self)
    }

    /// Compiles the effective pattern, producing the live instance.
    pub(crate) fn compile(self) -> PluginResult<PluginInstance> {
        let matcher = if self.regex.is_empty() {
            None
        } else {
            let compiled = Regex::new(&self.regex).map_err(|source| PluginError::InvalidPattern {
                plugin: self.definition.name().to_string(),
                pattern: self.regex.clone(),
                source,
            })?;
            Some(compiled)
        };

        Ok(PluginInstance {
            definition: self.definition,
            room_id: self.room_id,
            regex: self.regex,
            matcher,
            settings: self.settings,
        })
    }
}

/// A live binding of a plugin definition to one room.
///
/// Immutable: changing the pattern means unregistering and registering a new
/// instance. Identity is the `Arc` allocation, not the field values.
pub struct PluginInstance {
    definition: Arc<PluginDefinition>,
    room_id: String,
    regex: String,
    matcher: Option<Regex>,
    settings: Map<String, Value>,
}

impl PluginInstance {
    pub fn plugin(&self) -> &Arc<PluginDefinition> {
        &self.definition
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// The effective pattern; empty for a catch-all instance.
    pub fn regex(&self) -> &str {
        &self.regex
    }

    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    /// Deserializes one setting. `None` when absent or of the wrong shape.
    pub fn setting<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.settings.get(key)?;
        T::deserialize(value).ok()
    }

    /// Whether this instance wants `event`: same room, and the pattern (if
    /// any) matches the body.
    pub fn matches(&self, event: &Event) -> bool {
        if self.room_id != event.room_id() {
            return false;
        }
        match &self.matcher {
            Some(re) => re.is_match(event.body()),
            None => true,
        }
    }

    pub(crate) fn same_binding(&self, other: &Instance) -> bool {
        self.name() == other.name() && self.room_id == other.room_id && self.regex == other.regex
    }
}

impl fmt::Display for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.regex.is_empty() {
            write!(f, "{}@{}", self.name(), self.room_id)
        } else {
            write!(f, "{}@{} /{}/", self.name(), self.room_id, self.regex)
        }
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("plugin", &self.name())
            .field("room_id", &self.room_id)
            .field("regex", &self.regex)
            .field("settings", &self.settings)
            .finish()
    }
}
