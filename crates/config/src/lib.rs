#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for updkit
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/updkit/config.toml)
//! - Environment variables (`UPDKIT_*`)
//! - CLI flags (applied by the front end)

pub mod constants;
pub mod core;

pub use self::core::{
    GeneralConfig, InstallConfig, NetworkConfig, PathConfig, PublishConfig, SecurityConfig,
    UpdaterConfig,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use updkit_errors::{ConfigError, Error};
use updkit_types::{ColorChoice, OutputFormat, UpdateVersion};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub updater: UpdaterConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub install: InstallConfig,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join(constants::APP_DIR).join(constants::CONFIG_FILE))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if fs::try_exists(&config_path).await.unwrap_or(false) {
            Self::load_from_file(&config_path).await
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path or the default location
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Write the configuration as TOML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save_to_file(&self, path: &Path) -> Result<(), Error> {
        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            error: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::WriteError {
                    path: parent.display().to_string(),
                    error: e.to_string(),
                })?;
        }
        fs::write(path, contents)
            .await
            .map_err(|e| ConfigError::WriteError {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;
        Ok(())
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(output) = std::env::var("UPDKIT_OUTPUT") {
            self.general.default_output = match output.as_str() {
                "plain" => OutputFormat::Plain,
                "tty" => OutputFormat::Tty,
                "json" => OutputFormat::Json,
                _ => return Err(invalid_env("UPDKIT_OUTPUT", output)),
            };
        }

        if let Ok(color) = std::env::var("UPDKIT_COLOR") {
            self.general.color = match color.as_str() {
                "always" => ColorChoice::Always,
                "auto" => ColorChoice::Auto,
                "never" => ColorChoice::Never,
                _ => return Err(invalid_env("UPDKIT_COLOR", color)),
            };
        }

        if let Ok(uri) = std::env::var("UPDKIT_CONFIGURATION_URI") {
            self.updater.configuration_uri = Some(uri);
        }

        if let Ok(version) = std::env::var("UPDKIT_CURRENT_VERSION") {
            if UpdateVersion::parse(&version).is_err() {
                return Err(invalid_env("UPDKIT_CURRENT_VERSION", version));
            }
            self.updater.current_version = Some(version);
        }

        if let Ok(value) = std::env::var("UPDKIT_ALLOW_ALPHA") {
            self.updater.allow_alpha = parse_bool("UPDKIT_ALLOW_ALPHA", value)?;
        }

        if let Ok(value) = std::env::var("UPDKIT_ALLOW_BETA") {
            self.updater.allow_beta = parse_bool("UPDKIT_ALLOW_BETA", value)?;
        }

        if let Ok(key) = std::env::var("UPDKIT_PUBLIC_KEY") {
            self.security.public_key = Some(key);
        }

        if let Ok(timeout) = std::env::var("UPDKIT_TIMEOUT") {
            self.network.timeout = timeout
                .parse()
                .map_err(|_| invalid_env("UPDKIT_TIMEOUT", timeout))?;
        }

        Ok(())
    }

    /// Configuration document URL
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` when unset.
    pub fn configuration_uri(&self) -> Result<&str, Error> {
        self.updater
            .configuration_uri
            .as_deref()
            .ok_or_else(|| missing("updater.configuration_uri"))
    }

    /// Parsed version of the running application
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` when unset or `InvalidValue` when
    /// the literal does not parse.
    pub fn current_version(&self) -> Result<UpdateVersion, Error> {
        let literal = self
            .updater
            .current_version
            .as_deref()
            .ok_or_else(|| missing("updater.current_version"))?;
        UpdateVersion::parse(literal).map_err(|_| {
            ConfigError::InvalidValue {
                field: "updater.current_version".to_string(),
                value: literal.to_string(),
            }
            .into()
        })
    }

    /// Public key packages must be signed with
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` when unset.
    pub fn public_key(&self) -> Result<&str, Error> {
        self.security
            .public_key
            .as_deref()
            .ok_or_else(|| missing("security.public_key"))
    }

    /// Root of the updkit data directory
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        self.paths.data_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(constants::APP_DIR)
        })
    }

    /// Directory downloaded packages are staged in
    #[must_use]
    pub fn staging_path(&self) -> PathBuf {
        self.paths
            .staging_path
            .clone()
            .unwrap_or_else(|| self.data_path().join(constants::STAGING_DIR))
    }

    /// Directory packages are extracted into before operations run
    #[must_use]
    pub fn work_path(&self) -> PathBuf {
        self.data_path().join(constants::WORK_DIR)
    }

    #[must_use]
    pub fn logs_path(&self) -> PathBuf {
        self.data_path().join(constants::LOGS_DIR)
    }

    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.data_path().join(constants::REGISTRY_FILE)
    }

    /// Record of packages published and removed from this machine
    #[must_use]
    pub fn publish_history_path(&self) -> PathBuf {
        self.data_path().join(constants::PUBLISH_HISTORY_FILE)
    }

    /// Install directory of the application being updated
    ///
    /// Defaults to the directory containing the running executable.
    #[must_use]
    pub fn program_path(&self) -> PathBuf {
        self.paths.program_path.clone().unwrap_or_else(|| {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }
}

fn missing(field: &str) -> Error {
    ConfigError::MissingField {
        field: field.to_string(),
    }
    .into()
}

fn invalid_env(field: &str, value: String) -> Error {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value,
    }
    .into()
}

fn parse_bool(field: &str, value: String) -> Result<bool, Error> {
    match value.as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(invalid_env(field, value)),
    }
}
