//! Configuration sections

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use updkit_types::{ColorChoice, OutputFormat};

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
    #[serde(default = "default_color_choice")]
    pub color: ColorChoice,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: default_output_format(),
            color: default_color_choice(),
        }
    }
}

/// What to look for and where
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// URL of the configuration document (`https://`, `http://` or `file://`)
    pub configuration_uri: Option<String>,
    /// Version of the running application
    pub current_version: Option<String>,
    #[serde(default)]
    pub allow_alpha: bool,
    #[serde(default)]
    pub allow_beta: bool,
    /// Culture used to pick changelog text
    #[serde(default = "default_culture")]
    pub culture: String,
    /// Send the statistics ping for configurations that request it
    #[serde(default = "default_true")]
    pub statistics: bool,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            configuration_uri: None,
            current_version: None,
            allow_alpha: false,
            allow_beta: false,
            culture: default_culture(),
            statistics: true,
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout")]
    pub timeout: u64, // seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64, // seconds
    #[serde(default = "default_chunk_timeout")]
    pub chunk_timeout: u64, // seconds
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64, // seconds
    #[serde(default = "default_max_package_size")]
    pub max_package_size: u64,
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            chunk_timeout: default_chunk_timeout(),
            retries: default_retries(),
            retry_delay: default_retry_delay(),
            max_package_size: default_max_package_size(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

/// Signature verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Base64 minisign public key packages must be signed with
    pub public_key: Option<String>,
    #[serde(default = "default_true")]
    pub verify_signatures: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            public_key: None,
            verify_signatures: true,
        }
    }
}

/// Installer behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    #[serde(default = "default_lock_retry_attempts")]
    pub lock_retry_attempts: u32,
    #[serde(default = "default_lock_retry_delay_ms")]
    pub lock_retry_delay_ms: u64,
    /// Launch the updated application after a successful install
    pub restart_command: Option<String>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            lock_retry_attempts: default_lock_retry_attempts(),
            lock_retry_delay_ms: default_lock_retry_delay_ms(),
            restart_command: None,
        }
    }
}

/// Where packages are published
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Registered transfer provider name
    #[serde(default = "default_provider")]
    pub provider: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Remote directory (or local directory for the `local` provider)
    pub directory: Option<PathBuf>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Public base URL the uploaded packages are reachable under
    pub base_uri: Option<String>,
    #[serde(default = "default_document_name")]
    pub document_name: String,
    /// Minisign secret key file
    pub secret_key: Option<PathBuf>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            host: None,
            port: None,
            directory: None,
            username: None,
            password: None,
            base_uri: None,
            document_name: default_document_name(),
            secret_key: None,
        }
    }
}

/// Path overrides; unset entries resolve under the platform data directory
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    pub staging_path: Option<PathBuf>,
    pub program_path: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Tty
}

fn default_color_choice() -> ColorChoice {
    ColorChoice::Auto
}

fn default_culture() -> String {
    "en".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_chunk_timeout() -> u64 {
    60
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1
}

fn default_max_package_size() -> u64 {
    2 * 1024 * 1024 * 1024 // 2 GiB
}

fn default_progress_interval_ms() -> u64 {
    100
}

fn default_lock_retry_attempts() -> u32 {
    10
}

fn default_lock_retry_delay_ms() -> u64 {
    50
}

fn default_provider() -> String {
    "local".to_string()
}

fn default_document_name() -> String {
    "updates.json".to_string()
}
