//! Transfer settings and results

use std::path::PathBuf;
use std::time::Duration;
use updkit_config::Config;
use updkit_types::{UpdateConfiguration, UpdateVersion};

/// Settings for one transfer batch
#[derive(Clone, Debug)]
pub struct TransferConfig {
    /// Directory receiving `<version>.zip`
    pub staging_dir: PathBuf,
    /// Longest wait for the next chunk of a response body
    pub chunk_timeout: Duration,
    pub max_file_size: u64,
    /// Minimum spacing between progress reports
    pub progress_interval: Duration,
}

impl TransferConfig {
    #[must_use]
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            staging_dir: config.staging_path(),
            chunk_timeout: Duration::from_secs(config.network.chunk_timeout),
            max_file_size: config.network.max_package_size,
            progress_interval: Duration::from_millis(config.network.progress_interval_ms),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            staging_dir: std::env::temp_dir().join("updkit").join("staging"),
            chunk_timeout: Duration::from_secs(60),
            max_file_size: 2 * 1024 * 1024 * 1024,
            progress_interval: Duration::from_millis(100),
        }
    }
}

/// A package that finished downloading
#[derive(Clone, Debug, PartialEq)]
pub struct DownloadedPackage {
    /// Configuration the package was downloaded for
    pub configuration: UpdateConfiguration,
    pub path: PathBuf,
    pub size: u64,
    /// BLAKE3 digest of the file, hex encoded
    pub blake3: String,
}

impl DownloadedPackage {
    #[must_use]
    pub fn version(&self) -> &UpdateVersion {
        &self.configuration.literal_version
    }

    /// Detached signature published with the configuration
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.configuration.signature
    }
}

/// How a transfer batch ended
#[derive(Clone, Debug, PartialEq)]
pub enum TransferOutcome {
    Completed(Vec<DownloadedPackage>),
    /// Stopped by the caller; completed packages stay on disk
    Cancelled { completed: Vec<DownloadedPackage> },
}

impl TransferOutcome {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    #[must_use]
    pub fn packages(&self) -> &[DownloadedPackage] {
        match self {
            Self::Completed(packages) | Self::Cancelled { completed: packages } => packages,
        }
    }

    #[must_use]
    pub fn into_packages(self) -> Vec<DownloadedPackage> {
        match self {
            Self::Completed(packages) | Self::Cancelled { completed: packages } => packages,
        }
    }
}
