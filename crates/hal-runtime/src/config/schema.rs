//! Configuration schema definitions.
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [router]
//! inbound_capacity = 256
//! command_prefix = "!"
//! callback_timeout_ms = 30000
//! fallback_timeout_ms = 5000
//!
//! [brokers.console]
//! room = "lobby"
//!
//! [[instances]]
//! plugin = "echo"
//! room = "lobby"
//!
//! [[instances]]
//! plugin = "pager"
//! room = "ops"
//! regex = "^!page"
//! settings = { rotation = "weekly" }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use figment::value::Value;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HalConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Router sizing and dispatch behaviour.
    #[serde(default)]
    pub router: RouterConfig,

    /// Per-broker tables, keyed by `ConfigurableBroker::config_key()`.
    #[serde(default)]
    pub brokers: HashMap<String, Value>,

    /// Plugin instances to attach at startup.
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

// =============================================================================
// Router
// =============================================================================

/// Router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Capacity of the shared inbound channel.
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,

    /// Capacity of each broker's private channel.
    #[serde(default = "default_broker_capacity")]
    pub broker_capacity: usize,

    /// Prefix that makes a message command shaped.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Reply to unmatched commands with a "not understood" message.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: bool,

    /// Per-callback timeout in milliseconds. `0` disables it.
    #[serde(default)]
    pub callback_timeout_ms: u64,

    /// Timeout for the unmatched-command fallback, in milliseconds. Always
    /// applied; `0` means the default.
    #[serde(default = "default_fallback_timeout_ms")]
    pub fallback_timeout_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: default_inbound_capacity(),
            broker_capacity: default_broker_capacity(),
            command_prefix: default_command_prefix(),
            fallback_reply: default_fallback_reply(),
            callback_timeout_ms: 0,
            fallback_timeout_ms: default_fallback_timeout_ms(),
        }
    }
}

impl RouterConfig {
    /// The callback timeout, if enabled.
    pub fn callback_timeout(&self) -> Option<Duration> {
        (self.callback_timeout_ms > 0).then(|| Duration::from_millis(self.callback_timeout_ms))
    }

    /// The fallback timeout. Never unbounded.
    pub fn fallback_timeout(&self) -> Duration {
        match self.fallback_timeout_ms {
            0 => Duration::from_millis(default_fallback_timeout_ms()),
            ms => Duration::from_millis(ms),
        }
    }
}

fn default_inbound_capacity() -> usize {
    256
}

fn default_broker_capacity() -> usize {
    64
}

fn default_command_prefix() -> String {
    hal_framework::DEFAULT_PREFIX.to_string()
}

fn default_fallback_reply() -> bool {
    true
}

fn default_fallback_timeout_ms() -> u64 {
    5_000
}

// =============================================================================
// Instances
// =============================================================================

/// One plugin instance to attach at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Plugin definition name.
    pub plugin: String,

    /// Room id the instance is bound to.
    pub room: String,

    /// Pattern override; the plugin's default pattern when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,

    /// Instance settings handed to the plugin.
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Output destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Span lifecycle events to log.
    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,

    /// Log file for `output = "file"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    /// Rotation of the log file.
    #[serde(default)]
    pub rotation: LogRotation,

    /// Per-target levels, e.g. `hal_runtime = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the level as a filter directive string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

/// Log output destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Log file rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Span events to log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}
