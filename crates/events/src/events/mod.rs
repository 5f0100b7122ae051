use serde::{Deserialize, Serialize};

use crate::EventSource;
use updkit_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod download;
pub mod general;
pub mod install;
pub mod publish;
pub mod resolver;

pub use download::*;
pub use general::*;
pub use install::*;
pub use publish::*;
pub use resolver::*;

/// Top-level application event, one variant per domain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    General(GeneralEvent),

    /// Update search over the configuration document
    Resolver(ResolverEvent),

    Download(DownloadEvent),

    /// Validation, extraction and operation execution
    Install(InstallEvent),

    Publish(PublishEvent),
}

impl AppEvent {
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Resolver(_) => EventSource::RESOLVER,
            Self::Download(_) => EventSource::DOWNLOAD,
            Self::Install(_) => EventSource::INSTALL,
            Self::Publish(_) => EventSource::PUBLISH,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. } | GeneralEvent::OperationFailed { .. })
            | Self::Resolver(ResolverEvent::SearchFailed { .. })
            | Self::Download(DownloadEvent::Failed { .. })
            | Self::Install(InstallEvent::OperationFailed { .. })
            | Self::Publish(PublishEvent::StepFailed { .. }) => Level::ERROR,

            Self::Publish(PublishEvent::RollbackCompleted { failed, .. }) if !failed.is_empty() => {
                Level::ERROR
            }

            Self::General(GeneralEvent::Warning { .. })
            | Self::Download(DownloadEvent::Cancelled { .. })
            | Self::Install(
                InstallEvent::Cancelled { .. }
                | InstallEvent::OperationRetrying { .. }
                | InstallEvent::ValidationCompleted { valid: false, .. },
            )
            | Self::Publish(PublishEvent::RollbackStarted { .. }) => Level::WARN,

            Self::General(GeneralEvent::DebugLog { .. } | GeneralEvent::StatisticsReported { .. })
            | Self::Resolver(ResolverEvent::CandidateSkipped { .. })
            | Self::Download(DownloadEvent::Progress { .. })
            | Self::Install(InstallEvent::OperationStarted { .. } | InstallEvent::OperationCompleted { .. }) => {
                Level::DEBUG
            }

            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "updkit::events::general",
            Self::Resolver(_) => "updkit::events::resolver",
            Self::Download(_) => "updkit::events::download",
            Self::Install(_) => "updkit::events::install",
            Self::Publish(_) => "updkit::events::publish",
        }
    }
}
