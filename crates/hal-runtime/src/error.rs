//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A broker with this name is already attached to the router.
    #[error("Broker already attached: {0}")]
    DuplicateBroker(String),

    /// No broker with this name is attached.
    #[error("Broker not found: {0}")]
    UnknownBroker(String),

    /// The route loop was started twice.
    #[error("Router is already routing")]
    AlreadyRouting,

    /// The router has been shut down and accepts no more brokers.
    #[error("Router is shut down")]
    ShutDown,

    /// Broker configuration deserialization failed.
    #[error("Failed to deserialize broker config: {0}")]
    BrokerConfigDeserialize(String),

    /// Registry error.
    #[error("Plugin error: {0}")]
    Plugin(#[from] hal_core::PluginError),

    /// Broker error.
    #[error("Broker error: {0}")]
    Broker(#[from] hal_core::BrokerError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
