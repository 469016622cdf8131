//! Configuration validation utilities.

use std::collections::HashSet;

use regex::Regex;

use super::error::{ConfigError, ConfigResult};
use super::schema::{HalConfig, InstanceConfig, LogOutput, LoggingConfig, RouterConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &HalConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_router_config(&config.router)?;
    validate_instances(&config.instances)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

fn validate_router_config(router: &RouterConfig) -> ConfigResult<()> {
    if router.inbound_capacity == 0 {
        return Err(ConfigError::validation(
            "router.inbound_capacity must be greater than 0",
        ));
    }

    if router.broker_capacity == 0 {
        return Err(ConfigError::validation(
            "router.broker_capacity must be greater than 0",
        ));
    }

    if router.command_prefix.trim().is_empty() {
        return Err(ConfigError::validation(
            "router.command_prefix cannot be empty",
        ));
    }

    Ok(())
}

/// Validates all instance entries.
fn validate_instances(instances: &[InstanceConfig]) -> ConfigResult<()> {
    let mut seen = HashSet::new();

    for instance in instances {
        validate_instance(instance)?;

        let key = (
            instance.plugin.as_str(),
            instance.room.as_str(),
            instance.regex.as_deref(),
        );
        if !seen.insert(key) {
            return Err(ConfigError::DuplicateInstance {
                plugin: instance.plugin.clone(),
                room: instance.room.clone(),
            });
        }
    }

    Ok(())
}

fn validate_instance(instance: &InstanceConfig) -> ConfigResult<()> {
    if instance.plugin.is_empty() {
        return Err(ConfigError::missing_field("instances.plugin"));
    }

    if instance.room.is_empty() {
        return Err(ConfigError::missing_field("instances.room"));
    }

    if let Some(pattern) = &instance.regex
        && let Err(e) = Regex::new(pattern)
    {
        return Err(ConfigError::validation(format!(
            "Invalid pattern for {} in {}: {e}",
            instance.plugin, instance.room
        )));
    }

    Ok(())
}
