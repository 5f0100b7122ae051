#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Pluggable storage backends for publishing updates
//!
//! A [`TransferProvider`] moves packages and the configuration document
//! between the publisher and wherever clients download them from.
//! Providers are looked up by name in a [`ProviderRegistry`].

mod local;
mod registry;

pub use local::LocalDirectoryProvider;
pub use registry::{ProviderFactory, ProviderRegistry};

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use updkit_config::PublishConfig;
use updkit_errors::{Error, PublishError};

/// Login for a remote provider
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where a provider stores files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub directory: Option<PathBuf>,
    pub credentials: Option<Credentials>,
}

impl ProviderSettings {
    #[must_use]
    pub fn local(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: Some(directory.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_config(config: &PublishConfig) -> Self {
        let credentials = config.username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: config.password.clone().unwrap_or_default(),
        });
        Self {
            host: config.host.clone(),
            port: config.port,
            directory: config.directory.clone(),
            credentials,
        }
    }
}

/// Storage backend for published files
///
/// Remote names are flat file names; nested paths are rejected.
#[async_trait]
pub trait TransferProvider: Send + Sync + fmt::Debug {
    /// Name the provider is registered under
    fn name(&self) -> &str;

    fn settings(&self) -> &ProviderSettings;

    /// Store `local` as `remote_name`, replacing any existing file
    async fn upload(&self, local: &Path, remote_name: &str) -> Result<(), Error>;

    /// Fetch `remote_name` into `local`
    async fn download(&self, remote_name: &str, local: &Path) -> Result<(), Error>;

    async fn delete(&self, remote_name: &str) -> Result<(), Error>;

    /// Names of the stored files, sorted
    async fn list(&self) -> Result<Vec<String>, Error>;

    async fn exists(&self, remote_name: &str) -> Result<bool, Error> {
        Ok(self.list().await?.iter().any(|name| name == remote_name))
    }
}

/// Reject remote names that are empty or contain path components
///
/// # Errors
///
/// Returns `PublishError::Provider` for names that are not a single file name.
pub fn validate_remote_name(remote_name: &str) -> Result<(), Error> {
    let valid = !remote_name.is_empty()
        && remote_name != "."
        && remote_name != ".."
        && !remote_name.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(PublishError::Provider {
            message: format!("invalid remote file name '{remote_name}'"),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_name_validation() {
        assert!(validate_remote_name("1.2.0.zip").is_ok());
        assert!(validate_remote_name("").is_err());
        assert!(validate_remote_name("..").is_err());
        assert!(validate_remote_name("../escape.zip").is_err());
        assert!(validate_remote_name("dir\\file").is_err());
    }

    #[test]
    fn test_settings_from_config_redacts_password() {
        let config = PublishConfig {
            host: Some("updates.example.com".into()),
            port: Some(21),
            username: Some("deploy".into()),
            password: Some("hunter2".into()),
            ..PublishConfig::default()
        };
        let settings = ProviderSettings::from_config(&config);
        assert_eq!(settings.port, Some(21));
        let debug = format!("{settings:?}");
        assert!(debug.contains("deploy"));
        assert!(!debug.contains("hunter2"));
    }
}
