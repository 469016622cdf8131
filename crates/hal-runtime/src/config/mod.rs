//! Configuration for the hal runtime.
//!
//! Settings are loaded with [`ConfigLoader`] from TOML/YAML files and `HAL_*`
//! environment variables, then checked with [`validate_config`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    HalConfig, InstanceConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    RouterConfig, SpanEventConfig,
};
pub use validation::validate_config;
