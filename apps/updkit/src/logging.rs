//! Structured logging of application events
//!
//! Events are converted to tracing records at the level the event reports
//! for itself. Failures get their structured fields spelled out; everything
//! else is logged with its debug representation.

use updkit_events::{
    AppEvent, DownloadEvent, EventMessage, FailureContext, GeneralEvent, InstallEvent,
    PublishEvent, ResolverEvent,
};
use tracing::{debug, error, info, trace, warn};

/// Log an event with the tracing infrastructure
pub fn log_event_with_tracing(message: &EventMessage) {
    let event = &message.event;
    let meta = &message.meta;

    match event {
        AppEvent::Resolver(ResolverEvent::SearchCompleted {
            current_version,
            newest,
            update_count,
            total_package_size,
            necessary,
        }) => {
            info!(
                source = meta.source.as_str(),
                event_id = %meta.event_id,
                correlation = ?meta.correlation_id,
                current_version = %current_version,
                newest = ?newest.as_ref().map(ToString::to_string),
                update_count,
                total_package_size,
                necessary,
                "Update search completed"
            );
        }

        AppEvent::Download(DownloadEvent::Completed {
            version,
            path,
            final_size,
            blake3,
        }) => {
            info!(
                source = meta.source.as_str(),
                event_id = %meta.event_id,
                correlation = ?meta.correlation_id,
                version = %version,
                path = %path.display(),
                final_size,
                blake3 = %blake3,
                "Package downloaded"
            );
        }

        AppEvent::Resolver(ResolverEvent::SearchFailed { failure }) => {
            log_failure(message, failure, "Update search failed");
        }
        AppEvent::Download(DownloadEvent::Failed { failure, .. }) => {
            log_failure(message, failure, "Package download failed");
        }
        AppEvent::Install(InstallEvent::OperationFailed { index, failure }) => {
            error!(
                source = meta.source.as_str(),
                event_id = %meta.event_id,
                correlation = ?meta.correlation_id,
                index,
                code = ?failure.code,
                message = %failure.message,
                hint = ?failure.hint,
                "Install operation failed"
            );
        }
        AppEvent::Publish(PublishEvent::StepFailed { step, failure }) => {
            error!(
                source = meta.source.as_str(),
                event_id = %meta.event_id,
                correlation = ?meta.correlation_id,
                step = %step,
                retryable = failure.retryable,
                code = ?failure.code,
                message = %failure.message,
                "Publish step failed"
            );
        }

        AppEvent::General(GeneralEvent::Warning { message, context }) => {
            warn!(
                source = meta.source.as_str(),
                event_id = %meta.event_id,
                correlation = ?meta.correlation_id,
                message = %message,
                context = ?context,
                "Warning"
            );
        }
        AppEvent::General(GeneralEvent::Error { message, details }) => {
            error!(
                source = meta.source.as_str(),
                event_id = %meta.event_id,
                correlation = ?meta.correlation_id,
                message = %message,
                details = ?details,
                "Error"
            );
        }

        _ => match meta.tracing_level() {
            tracing::Level::ERROR => {
                error!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?event, "Application event");
            }
            tracing::Level::WARN => {
                warn!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?event, "Application event");
            }
            tracing::Level::INFO => {
                info!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?event, "Application event");
            }
            tracing::Level::DEBUG => {
                debug!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?event, "Application event");
            }
            tracing::Level::TRACE => {
                trace!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?event, "Application event");
            }
        },
    }
}

fn log_failure(message: &EventMessage, failure: &FailureContext, text: &'static str) {
    let meta = &message.meta;
    if failure.retryable {
        warn!(
            source = meta.source.as_str(),
            event_id = %meta.event_id,
            correlation = ?meta.correlation_id,
            retryable = failure.retryable,
            code = ?failure.code,
            message = %failure.message,
            hint = ?failure.hint,
            "{text}"
        );
    } else {
        error!(
            source = meta.source.as_str(),
            event_id = %meta.event_id,
            correlation = ?meta.correlation_id,
            retryable = failure.retryable,
            code = ?failure.code,
            message = %failure.message,
            hint = ?failure.hint,
            "{text}"
        );
    }
}
