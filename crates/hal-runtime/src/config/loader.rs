//! Layered configuration loading with figment.
//!
//! Sources, lowest priority first:
//!
//! 1. [`HalConfig::default`]
//! 2. Configs merged with [`ConfigLoader::merge`]
//! 3. The profile file, e.g. `hal.production.toml`
//! 4. The main file, `hal.toml` (or `config.toml`, `hal.yaml`, `hal.yml`)
//! 5. `HAL_*` environment variables, `__` separating nested keys:
//!    `HAL_ROUTER__CALLBACK_TIMEOUT_MS=5000`, `HAL_BROKERS__CONSOLE__ROOM=ops`
//!
//! TOML files need the `toml-config` feature (default), YAML files need
//! `yaml-config`. With both enabled, both are searched.
//!
//! ```rust,ignore
//! use hal_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/hal.toml")
//!     .load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::HalConfig;

const ENV_PREFIX: &str = "HAL_";
const PROFILE_VAR: &str = "HAL_PROFILE";

/// The name of a configuration profile, e.g. `production`.
///
/// Names are lowercase; `dev` and `prod` are accepted as short forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile(String);

impl Profile {
    pub const DEVELOPMENT: &'static str = "development";
    pub const PRODUCTION: &'static str = "production";

    pub fn parse(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        Self(match name.as_str() {
            "dev" => Self::DEVELOPMENT.to_string(),
            "prod" => Self::PRODUCTION.to_string(),
            _ => name,
        })
    }

    /// The profile named by `HAL_PROFILE`, or development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|name| Self::parse(&name))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `hal.toml` becomes `hal.<profile>.toml`.
    fn file_name(&self, base: &str) -> Option<String> {
        let (stem, ext) = base.rsplit_once('.')?;
        Some(format!("{stem}.{}.{ext}", self.0))
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self(Self::DEVELOPMENT.to_string())
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A configuration file format compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    #[cfg(feature = "toml-config")]
    Toml,
    #[cfg(feature = "yaml-config")]
    Yaml,
}

impl FileFormat {
    const ENABLED: &'static [FileFormat] = &[
        #[cfg(feature = "toml-config")]
        FileFormat::Toml,
        #[cfg(feature = "yaml-config")]
        FileFormat::Yaml,
    ];

    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ENABLED
            .iter()
            .copied()
            .find(|format| format.extensions().contains(&ext))
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => &["toml"],
            #[cfg(feature = "yaml-config")]
            Self::Yaml => &["yaml", "yml"],
        }
    }

    /// File names searched for, most preferred first.
    fn base_names(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => &["hal.toml", "config.toml"],
            #[cfg(feature = "yaml-config")]
            Self::Yaml => &["hal.yaml", "hal.yml"],
        }
    }

    #[allow(unused_variables)]
    fn merge(self, figment: Figment, path: &Path) -> Figment {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => figment.merge(Toml::file(path)),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => figment.merge(Yaml::file(path)),
        }
    }
}

/// Builds a [`HalConfig`] from defaults, files and the environment.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    file: Option<PathBuf>,
    env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// A loader with the profile from `HAL_PROFILE` and environment
    /// overrides enabled.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            file: None,
            env: true,
        }
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::parse(&profile.into());
        self
    }

    /// Adds a directory to search for configuration files.
    ///
    /// Without any, the current directory and `<user config dir>/hal` are
    /// searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join("hal")),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching. A missing file is an
    /// error.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// Layers `config` over the defaults, below every file.
    pub fn merge(mut self, config: HalConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    pub fn load(self) -> ConfigResult<HalConfig> {
        let config: HalConfig = self
            .figment()?
            .extract()
            .map_err(|e| ConfigError::ParseError(format!("Failed to extract configuration: {e}")))?;

        debug!(
            profile = %self.profile,
            brokers = config.brokers.len(),
            instances = config.instances.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn figment(&self) -> ConfigResult<Figment> {
        let mut figment =
            Figment::from(Serialized::defaults(HalConfig::default())).merge(self.overrides.clone());

        let files = match &self.file {
            Some(path) if !path.exists() => return Err(ConfigError::FileNotFound(path.clone())),
            Some(path) => vec![path.clone()],
            None => self.discover(),
        };
        if files.is_empty() {
            warn!("No configuration file found, using defaults");
        }

        for path in &files {
            let format = FileFormat::from_path(path).ok_or_else(|| {
                ConfigError::ParseError(format!(
                    "Unsupported or disabled configuration file format: {}",
                    path.display()
                ))
            })?;
            info!(path = %path.display(), "Loading configuration file");
            figment = format.merge(figment, path);
        }

        if self.env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).split("__"));
        }
        Ok(figment)
    }

    /// Configuration files to merge, lowest priority first.
    ///
    /// Per format, the first search path holding a base file wins; its
    /// profile file, if any, goes in just before it.
    fn discover(&self) -> Vec<PathBuf> {
        let roots = if self.search_paths.is_empty() {
            Self::new().with_current_dir().with_user_config_dir().search_paths
        } else {
            self.search_paths.clone()
        };

        let mut files = Vec::new();
        for format in FileFormat::ENABLED {
            'roots: for root in &roots {
                for base in format.base_names() {
                    if let Some(name) = self.profile.file_name(base) {
                        let profiled = root.join(name);
                        if profiled.exists() {
                            files.push(profiled);
                        }
                    }
                    let path = root.join(base);
                    if path.exists() {
                        files.push(path);
                        break 'roots;
                    }
                }
            }
        }
        files
    }
}

/// Loads configuration from the current directory and the user config
/// directory, plus `HAL_*` variables.
pub fn load_config() -> ConfigResult<HalConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from one file plus `HAL_*` variables.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<HalConfig> {
    ConfigLoader::new().file(path).load()
}
