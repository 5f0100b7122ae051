//! Publishing workflow error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PublishError {
    #[error("publish step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    #[error("publish step '{step}' failed and {failed_undos} undo action(s) also failed: {message}")]
    RollbackIncomplete {
        step: String,
        message: String,
        failed_undos: usize,
    },

    #[error("version {version} is already published")]
    AlreadyPublished { version: String },

    #[error("version {version} is not published")]
    NotPublished { version: String },

    #[error("transfer provider error: {message}")]
    Provider { message: String },

    #[error("unknown transfer provider: {name}")]
    UnknownProvider { name: String },

    #[error("publish history {path} is unreadable: {message}")]
    CorruptHistory { path: String, message: String },
}

impl UserFacingError for PublishError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::StepFailed { .. } => Some("All completed steps were undone; retry the publish."),
            Self::RollbackIncomplete { .. } => {
                Some("Inspect the remote directory and remove leftover files by hand.")
            }
            Self::AlreadyPublished { .. } => Some("Increase the version or unpublish it first."),
            Self::UnknownProvider { .. } => Some("Register the transfer provider before using it."),
            Self::CorruptHistory { .. } => Some("Move the history file aside; a new one is started."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::StepFailed { .. } | Self::Provider { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::StepFailed { .. } => "publish.step_failed",
            Self::RollbackIncomplete { .. } => "publish.rollback_incomplete",
            Self::AlreadyPublished { .. } => "publish.already_published",
            Self::NotPublished { .. } => "publish.not_published",
            Self::Provider { .. } => "publish.provider",
            Self::UnknownProvider { .. } => "publish.unknown_provider",
            Self::CorruptHistory { .. } => "publish.corrupt_history",
        };
        Some(code)
    }
}
