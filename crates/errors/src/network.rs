//! Network-related error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum NetworkError {
    #[error("connection timeout to {url}")]
    Timeout { url: String },

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("transfer of update {version} failed: {message}")]
    TransferFailed { version: String, message: String },

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported protocol: {protocol}")]
    UnsupportedProtocol { protocol: String },

    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },

    #[error("file size {size} exceeds limit {limit}")]
    FileSizeExceeded { size: u64, limit: u64 },

    #[error("invalid update configuration document: {message}")]
    InvalidConfigurationDocument { message: String },

    #[error("network unavailable")]
    NetworkUnavailable,

    #[error("rate limited: retry after {seconds} seconds")]
    RateLimited { seconds: u64 },
}

impl UserFacingError for NetworkError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Timeout { .. } | Self::ConnectionRefused(_) | Self::NetworkUnavailable => {
                Some("Check your network connection and the update server address.")
            }
            Self::TransferFailed { .. } | Self::DownloadFailed(_) => {
                Some("Retry the update; the whole batch will be downloaded again.")
            }
            Self::InvalidUrl(_) | Self::UnsupportedProtocol { .. } => {
                Some("Use an http, https or file URL for the update location.")
            }
            Self::InvalidConfigurationDocument { .. } => {
                Some("Republish the update configuration from the administration tool.")
            }
            Self::RateLimited { .. } => Some("Wait a moment before checking for updates again."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::DownloadFailed(_)
                | Self::TransferFailed { .. }
                | Self::ConnectionRefused(_)
                | Self::NetworkUnavailable
                | Self::RateLimited { .. }
        ) || matches!(self, Self::HttpError { status, .. } if *status >= 500)
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Timeout { .. } => "network.timeout",
            Self::DownloadFailed(_) => "network.download_failed",
            Self::TransferFailed { .. } => "network.transfer_failed",
            Self::ConnectionRefused(_) => "network.connection_refused",
            Self::InvalidUrl(_) => "network.invalid_url",
            Self::UnsupportedProtocol { .. } => "network.unsupported_protocol",
            Self::HttpError { .. } => "network.http_error",
            Self::FileSizeExceeded { .. } => "network.file_size_exceeded",
            Self::InvalidConfigurationDocument { .. } => "network.invalid_configuration",
            Self::NetworkUnavailable => "network.unavailable",
            Self::RateLimited { .. } => "network.rate_limited",
        };
        Some(code)
    }
}
