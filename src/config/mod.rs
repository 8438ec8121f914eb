// Required external crates for configuration management and serialization
use serde::Deserialize;
use std::path::{Path, PathBuf};
use config::{Config, ConfigError, Environment, File};

use crate::frontend::FrontendChoice;

pub mod starred;

pub use starred::{StarredStore, StoreError};

/// Configuration for the external model manager binary
#[derive(Debug, Deserialize, Clone)]
pub struct ManagerConfig {
    /// Name or path of the model manager executable
    pub binary: String,
    /// Sub-command used to remove a model
    pub delete_subcommand: String,
}

/// Configuration for the Open WebUI usage cross-reference
#[derive(Debug, Deserialize, Clone)]
pub struct OpenWebUiConfig {
    /// Whether usage statistics are looked up at all
    pub enabled: bool,
    /// Whether copied databases are kept obfuscated at rest
    pub obfuscate: bool,
    /// Directory probed before the built-in candidates
    pub data_dir: Option<PathBuf>,
    /// Maximum directory depth of the fallback filesystem search
    pub search_depth: usize,
    /// Whether containers are probed for a database copy
    pub docker_copy: bool,
}

/// Configuration for front-end selection
#[derive(Debug, Deserialize, Clone)]
pub struct FrontendConfig {
    /// Requested front-end
    pub choice: FrontendChoice,
    /// Feature flag gating the interactive shell during auto-selection
    pub interactive: bool,
}

/// Configuration for application logging
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Optional log directory
    pub file: Option<PathBuf>,
}

/// Configuration for persisted user state
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Location of the starred-models file, defaults to the home directory
    pub starred_file: Option<PathBuf>,
}

/// Main settings struct that contains all configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub manager: ManagerConfig,
    pub openwebui: OpenWebUiConfig,
    pub frontend: FrontendConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Settings {
    /// Creates a new Settings instance from the `config` directory under the
    /// current working directory.
    ///
    /// Sources in order of precedence (highest to lowest):
    /// 1. Environment variables prefixed with OMV_ (`OMV_MANAGER__BINARY=...`)
    /// 2. Local config file (local.toml) if present
    /// 3. Default config file (default.toml) if present
    /// 4. Compiled-in defaults
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = std::env::current_dir()
            .map_err(|e| ConfigError::Message(
                format!("Failed to get current directory: {}", e)
            ))?
            .join("config");

        Self::from_dir(&config_dir)
    }

    /// Loads settings from an explicit configuration directory.
    ///
    /// A missing directory is not an error: the compiled-in defaults are used.
    pub fn from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let default_config = config_dir.join("default.toml");
        let local_config = config_dir.join("local.toml");

        let default_config_path = default_config.to_string_lossy();
        let local_config_path = local_config.to_string_lossy();

        let settings = Config::builder()
            .set_default("manager.binary", "ollama")?
            .set_default("manager.delete_subcommand", "rm")?
            .set_default("openwebui.enabled", true)?
            .set_default("openwebui.obfuscate", true)?
            .set_default("openwebui.search_depth", 4)?
            .set_default("openwebui.docker_copy", true)?
            .set_default("frontend.choice", "auto")?
            .set_default("frontend.interactive", true)?
            .set_default("logging.level", "info")?
            .set_default("logging.file", "logs")?
            .add_source(File::with_name(&default_config_path).required(false))
            .add_source(File::with_name(&local_config_path).required(false))
            .add_source(
                Environment::with_prefix("OMV")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize::<Settings>()
            .map_err(|e| ConfigError::Message(
                format!("Invalid configuration in {}: {}", default_config_path, e)
            ))?;

        settings.validate()?;

        Ok(settings)
    }

    /// Resolved path of the starred-models file.
    pub fn starred_path(&self) -> Option<PathBuf> {
        self.storage
            .starred_file
            .clone()
            .or_else(StarredStore::default_path)
    }

    /// Resolved log directory.
    pub fn log_dir(&self) -> &Path {
        self.logging.file.as_deref().unwrap_or_else(|| Path::new("logs"))
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        if self.manager.binary.trim().is_empty() {
            return Err(ConfigError::Message(
                "manager.binary must not be empty".to_string()
            ));
        }

        if self.manager.delete_subcommand.trim().is_empty() {
            return Err(ConfigError::Message(
                "manager.delete_subcommand must not be empty".to_string()
            ));
        }

        if self.openwebui.search_depth == 0 {
            return Err(ConfigError::Message(
                "openwebui.search_depth must be greater than 0".to_string()
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            _ => Err(ConfigError::Message(
                format!("Invalid logging level: {}. Must be one of: error, warn, info, debug, trace",
                    self.logging.level)
            )),
        }?;

        Ok(())
    }
}
