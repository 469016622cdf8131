//! Runtime orchestration.
//!
//! [`HalRuntime`] owns the plugin [`Registry`] and the [`Router`], wires
//! brokers and instances from configuration, and runs the route loop until
//! a shutdown signal arrives.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hal_runtime::HalRuntime;
//!
//! // Auto-loads hal.toml from the current directory
//! let runtime = HalRuntime::new();
//!
//! // Custom configuration path
//! let runtime = HalRuntime::builder()
//!     .config_file("config/hal.toml")
//!     .build()?;
//!
//! // Use pre-loaded config
//! let config = load_config()?;
//! let runtime = HalRuntime::from_config(&config);
//! ```

use std::future::Future;
use std::sync::Arc;

use hal_core::{
    BoxedBroker, ConfigurableBroker, PluginDefinition, PluginError, PluginInstance, Registry,
};
use hal_framework::Fallback;
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::{ConfigLoader, ConfigResult, HalConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::router::Router;

/// The hal runtime.
///
/// # Simple Usage
///
/// ```rust,ignore
/// let runtime = HalRuntime::new();
///
/// runtime.register_plugin(echo_plugin());
/// runtime.add_configured_broker::<ConsoleBroker>()?;
/// runtime.load_instances()?;
/// runtime.run().await?;
/// ```
pub struct HalRuntime {
    config: HalConfig,
    registry: Arc<Registry>,
    router: Arc<Router>,
}

impl HalRuntime {
    /// Creates a runtime with automatic configuration loading.
    ///
    /// Searches the current directory for `hal.toml`; if none is found, or
    /// it fails to load or validate, default settings are used.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .and_then(|config| validate_config(&config).map(|()| config))
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                HalConfig::default()
            });

        Self::from_config(&config)
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Initializes logging from `config.logging`. The configuration is not
    /// validated here; [`RuntimeBuilder::build`] does that.
    pub fn from_config(config: &HalConfig) -> Self {
        logging::init_from_config(&config.logging);

        let registry = Arc::new(Registry::new());
        let router = Arc::new(Router::new(Arc::clone(&registry), config.router.clone()));

        info!(
            log_level = %config.logging.level,
            inbound_capacity = config.router.inbound_capacity,
            command_prefix = %config.router.command_prefix,
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            registry,
            router,
        }
    }

    pub fn config(&self) -> &HalConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    // =========================================================================
    // Plugins
    // =========================================================================

    /// Registers a plugin definition. A duplicate name keeps the first one.
    pub fn register_plugin(&self, definition: PluginDefinition) -> Arc<PluginDefinition> {
        let definition = self.registry.register_definition(definition);
        info!(plugin = definition.name(), "Registered plugin");
        definition
    }

    /// Registers every built-in plugin.
    #[cfg(feature = "builtin-plugins")]
    pub fn load_builtin_plugins(&self) {
        self.register_plugin(hal_framework::plugin_manager(
            &self.registry,
            &self.config.router.command_prefix,
        ));
    }

    /// Attaches a registered plugin to a room with its default pattern.
    ///
    /// Attaching the same plugin to the same room twice returns the existing
    /// instance.
    pub fn attach(&self, plugin: &str, room: &str) -> RuntimeResult<Arc<PluginInstance>> {
        let definition = self
            .registry
            .definition(plugin)
            .ok_or_else(|| PluginError::UnknownPlugin(plugin.to_string()))?;
        let instance = self.registry.register_if_absent(definition.instantiate(room))?;
        info!(instance = %instance, "Attached plugin");
        Ok(instance)
    }

    /// Attaches every `[[instances]]` entry of the configuration.
    ///
    /// Entries already live are left alone, so this can be replayed safely.
    /// Returns the number of instances live afterwards.
    pub fn load_instances(&self) -> RuntimeResult<usize> {
        for entry in &self.config.instances {
            let definition = self
                .registry
                .definition(&entry.plugin)
                .ok_or_else(|| PluginError::UnknownPlugin(entry.plugin.clone()))?;

            let mut pending = definition
                .instantiate(entry.room.as_str())
                .settings(entry.settings.clone());
            if let Some(regex) = &entry.regex {
                pending = pending.regex(regex.as_str());
            }

            let instance = self.registry.register_if_absent(pending)?;
            info!(instance = %instance, "Loaded plugin instance");
        }

        Ok(self.registry.instance_count())
    }

    /// Replaces the handler for unmatched commands.
    pub fn set_fallback<F: Fallback + 'static>(&self, fallback: F) {
        self.router.set_fallback(fallback);
    }

    // =========================================================================
    // Brokers
    // =========================================================================

    /// Attaches a broker to the router.
    pub fn add_broker(&self, broker: BoxedBroker) -> RuntimeResult<()> {
        self.router.add_broker(broker)
    }

    /// Creates a broker from its `brokers.<key>` table and attaches it.
    ///
    /// This will:
    /// 1. Look for configuration under `brokers.<B::config_key()>`
    /// 2. If found, deserialize it into `B::Config`
    /// 3. If not found, use `B::Config::default()`
    /// 4. Build the broker with `B::from_config` and attach it
    pub fn add_configured_broker<B>(&self) -> RuntimeResult<()>
    where
        B: ConfigurableBroker,
    {
        let key = B::config_key();

        let config: B::Config = if let Some(value) = self.config.brokers.get(key) {
            value.deserialize().map_err(|e| {
                RuntimeError::BrokerConfigDeserialize(format!(
                    "Failed to deserialize config for broker '{key}': {e}"
                ))
            })?
        } else {
            warn!(
                broker = key,
                "No configuration found for broker, using default"
            );
            Default::default()
        };

        self.add_broker(Arc::new(B::from_config(config)))
    }

    // =========================================================================
    // Running
    // =========================================================================

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        info!("hal runtime is now running. Press Ctrl+C to stop.");
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes, then stops the router and every
    /// broker attachment.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            brokers = ?self.router.broker_names(),
            instances = self.registry.instance_count(),
            "Starting router"
        );

        let result = tokio::select! {
            result = self.router.route() => result,
            () = shutdown => Ok(()),
        };

        self.router.shutdown();
        info!("Runtime stopped");
        result
    }
}

impl Default for HalRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for shutdown signals (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                wait_for_ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

/// Builder for a [`HalRuntime`] with custom configuration.
///
/// ```rust,ignore
/// let runtime = HalRuntime::builder()
///     .config_file("config/hal.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    loader: ConfigLoader,
}

impl RuntimeBuilder {
    /// A builder searching the current directory.
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new().with_current_dir(),
        }
    }

    fn map(self, f: impl FnOnce(ConfigLoader) -> ConfigLoader) -> Self {
        Self {
            loader: f(self.loader),
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn config_file<P: AsRef<std::path::Path>>(self, path: P) -> Self {
        self.map(|loader| loader.file(path))
    }

    /// Selects the `hal.<profile>.toml` overlay, e.g. `production`.
    pub fn profile(self, profile: impl Into<String>) -> Self {
        self.map(|loader| loader.profile(profile))
    }

    pub fn search_path<P: AsRef<std::path::Path>>(self, path: P) -> Self {
        self.map(|loader| loader.search_path(path))
    }

    /// Ignores `HAL_*` environment variables.
    pub fn without_env(self) -> Self {
        self.map(ConfigLoader::without_env)
    }

    /// Layers `config` under every file and the environment.
    pub fn merge(self, config: HalConfig) -> Self {
        self.map(|loader| loader.merge(config))
    }

    /// Loads and validates the configuration, then builds the runtime.
    pub fn build(self) -> ConfigResult<HalRuntime> {
        let config = self.loader.load()?;
        validate_config(&config)?;
        Ok(HalRuntime::from_config(&config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use figment::value::Value;
    use hal_core::test_util::RecordingBroker;
    use hal_core::{Broker, BrokerResult, Event};
    use serde::Deserialize;
    use tokio::sync::{mpsc, oneshot};
    use tokio_test::{assert_err, assert_ok};

    use crate::config::InstanceConfig;

    fn noop(name: &str, regex: &str) -> PluginDefinition {
        PluginDefinition::new(name, regex, |_| async { Ok(()) })
    }

    fn entry(plugin: &str, room: &str, regex: Option<&str>) -> InstanceConfig {
        InstanceConfig {
            plugin: plugin.to_string(),
            room: room.to_string(),
            regex: regex.map(str::to_string),
            settings: serde_json::Map::from_iter([("volume".to_string(), serde_json::json!(11))]),
        }
    }

    #[test]
    fn test_load_instances_is_idempotent() {
        let config = HalConfig {
            instances: vec![
                entry("echo", "lobby", None),
                entry("echo", "ops", Some("^!say")),
            ],
            ..Default::default()
        };
        let runtime = HalRuntime::from_config(&config);
        runtime.register_plugin(noop("echo", "^!echo"));

        assert_eq!(assert_ok!(runtime.load_instances()), 2);
        assert_eq!(assert_ok!(runtime.load_instances()), 2);

        let ops = runtime.registry().find_instances("ops", "echo");
        assert_eq!(ops[0].regex(), "^!say");
        assert_eq!(ops[0].setting::<u32>("volume"), Some(11));
    }

    #[test]
    fn test_load_instances_unknown_plugin() {
        let config = HalConfig {
            instances: vec![entry("ghost", "lobby", None)],
            ..Default::default()
        };
        let runtime = HalRuntime::from_config(&config);

        let err = assert_err!(runtime.load_instances());
        assert!(matches!(
            err,
            RuntimeError::Plugin(PluginError::UnknownPlugin(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_attach() {
        let runtime = HalRuntime::from_config(&HalConfig::default());
        runtime.register_plugin(noop("ping", "^!ping"));

        let first = assert_ok!(runtime.attach("ping", "lobby"));
        let second = assert_ok!(runtime.attach("ping", "lobby"));
        assert!(Arc::ptr_eq(&first, &second));
        assert!(runtime.attach("pong", "lobby").is_err());
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = HalConfig::default();
        config.router.broker_capacity = 0;

        let result = HalRuntime::builder()
            .search_path("/nonexistent")
            .without_env()
            .merge(config)
            .build();
        assert!(result.is_err());
    }

    struct StaticBroker {
        room: String,
    }

    #[derive(Deserialize)]
    #[serde(default)]
    struct StaticConfig {
        room: String,
    }

    impl Default for StaticConfig {
        fn default() -> Self {
            Self {
                room: "lobby".to_string(),
            }
        }
    }

    #[async_trait]
    impl Broker for StaticBroker {
        fn name(&self) -> &str {
            "static"
        }

        async fn send(&self, _event: &Event) -> BrokerResult<()> {
            Ok(())
        }

        async fn stream(self: Arc<Self>, _out: mpsc::Sender<Event>) -> BrokerResult<()> {
            std::future::pending().await
        }

        fn room_name_to_id(&self, _name: &str) -> Option<String> {
            Some(self.room.clone())
        }
    }

    impl ConfigurableBroker for StaticBroker {
        type Config = StaticConfig;

        fn config_key() -> &'static str {
            "static"
        }

        fn from_config(config: Self::Config) -> Self {
            Self { room: config.room }
        }
    }

    #[tokio::test]
    async fn test_add_configured_broker() {
        let mut config = HalConfig::default();
        config.brokers.insert(
            "static".to_string(),
            assert_ok!(Value::serialize(serde_json::json!({ "room": "ops" }))),
        );
        let runtime = HalRuntime::from_config(&config);

        assert_ok!(runtime.add_configured_broker::<StaticBroker>());
        let broker = runtime.router().broker("static").unwrap();
        assert_eq!(broker.room_name_to_id("anything").as_deref(), Some("ops"));

        let err = assert_err!(runtime.add_configured_broker::<StaticBroker>());
        assert!(matches!(err, RuntimeError::DuplicateBroker(_)));
    }

    #[tokio::test]
    async fn test_add_configured_broker_defaults() {
        let runtime = HalRuntime::from_config(&HalConfig::default());
        assert_ok!(runtime.add_configured_broker::<StaticBroker>());

        let broker = runtime.router().broker("static").unwrap();
        assert_eq!(broker.room_name_to_id("x").as_deref(), Some("lobby"));
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let runtime = Arc::new(HalRuntime::from_config(&HalConfig::default()));
        runtime.register_plugin(PluginDefinition::new("ping", "^!ping", |event: Event| async move {
            event.reply("pong").await?;
            Ok(())
        }));
        assert_ok!(runtime.attach("ping", "lobby"));

        let broker = RecordingBroker::new("test");
        assert_ok!(runtime.add_broker(broker.clone()));

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let running = tokio::spawn({
            let runtime = Arc::clone(&runtime);
            async move {
                runtime
                    .run_until(async {
                        let _ = stop_rx.await;
                    })
                    .await
            }
        });

        broker.inject("lobby", "!ping");
        let sent = tokio::time::timeout(Duration::from_secs(5), broker.wait_for_sent(1))
            .await
            .expect("no reply");
        assert_eq!(sent[0].body(), "pong");

        stop_tx.send(()).unwrap();
        assert_ok!(running.await.unwrap());
        assert!(runtime.router().is_shut_down());
        assert!(runtime.router().broker_names().is_empty());
    }
}
