//! Unified error types for the hal core.
//!
//! Runtime-level errors (duplicate brokers, configuration) are defined in
//! `hal-runtime`.

use thiserror::Error;

/// Boxed error returned by plugin callbacks and fallback handlers.
///
/// The dispatcher only logs these; they never reach the broker or other
/// plugins.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Broker Errors
// =============================================================================

/// Errors raised by broker adapters.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// Delivering a message to the chat service failed.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// The inbound stream stopped with an unrecoverable error.
    #[error("broker stream failed: {0}")]
    StreamFailed(String),

    /// The channel the broker writes into was closed by the router.
    #[error("broker channel closed")]
    Closed,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BrokerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl BrokerError {
    /// Creates a send failure.
    pub fn send(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }
}

// =============================================================================
// Plugin Errors
// =============================================================================

/// Errors raised by the plugin registry.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// The effective pattern of an instance does not compile.
    #[error("invalid pattern '{pattern}' for plugin '{plugin}': {source}")]
    InvalidPattern {
        /// Plugin name.
        plugin: String,
        /// The offending pattern.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// Unregister was called for an instance that is not live.
    #[error("instance of plugin '{plugin}' in room '{room}' is not registered")]
    InstanceNotFound {
        /// Plugin name.
        plugin: String,
        /// Room the instance was bound to.
        room: String,
    },

    /// No plugin definition with this name exists.
    #[error("unknown plugin '{0}'")]
    UnknownPlugin(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Result type for registry operations.
pub type PluginResult<T> = Result<T, PluginError>;
