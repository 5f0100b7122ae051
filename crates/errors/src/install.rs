//! Installation system error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum InstallError {
    #[error("operation {index} ({area}/{method}) failed: {message}")]
    OperationFailed {
        index: usize,
        area: String,
        method: String,
        message: String,
    },

    #[error("resource still locked after {attempts} attempts: {path}")]
    LockedResource { path: String, attempts: u32 },

    #[error("unsupported operation: {area}/{method}")]
    UnsupportedOperation { area: String, method: String },

    #[error("invalid arguments for {area}/{method}: {message}")]
    InvalidArguments {
        area: String,
        method: String,
        message: String,
    },

    #[error("invalid package: {message}")]
    InvalidPackage { message: String },

    #[error("package entry escapes the extraction directory: {entry}")]
    PathTraversal { entry: String },

    #[error("filesystem operation failed: {operation} on {path}: {message}")]
    FilesystemError {
        operation: String,
        path: String,
        message: String,
    },

    #[error("registry operation failed on {key}: {message}")]
    RegistryError { key: String, message: String },

    #[error("process {program} failed: {message}")]
    ProcessFailed { program: String, message: String },

    #[error("unknown path placeholder: {placeholder}")]
    UnknownPlaceholder { placeholder: String },

    #[error("installation cancelled by user")]
    Cancelled,
}

impl UserFacingError for InstallError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::LockedResource { .. } => {
                Some("Close the application being updated and run the installer again.")
            }
            Self::OperationFailed { .. } => Some(
                "Operations before the failing step were applied and are not undone automatically.",
            ),
            Self::InvalidPackage { .. } | Self::PathTraversal { .. } => {
                Some("The package archive is damaged; download it again.")
            }
            Self::UnsupportedOperation { .. }
            | Self::InvalidArguments { .. }
            | Self::UnknownPlaceholder { .. } => {
                Some("Fix the operation list in the update configuration and republish.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::LockedResource { .. } | Self::FilesystemError { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::OperationFailed { .. } => "install.operation_failed",
            Self::LockedResource { .. } => "install.locked_resource",
            Self::UnsupportedOperation { .. } => "install.unsupported_operation",
            Self::InvalidArguments { .. } => "install.invalid_arguments",
            Self::InvalidPackage { .. } => "install.invalid_package",
            Self::PathTraversal { .. } => "install.path_traversal",
            Self::FilesystemError { .. } => "install.filesystem",
            Self::RegistryError { .. } => "install.registry",
            Self::ProcessFailed { .. } => "install.process_failed",
            Self::UnknownPlaceholder { .. } => "install.unknown_placeholder",
            Self::Cancelled => "install.cancelled",
        };
        Some(code)
    }
}
