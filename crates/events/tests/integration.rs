//! Integration tests for events

#[cfg(test)]
mod tests {
    use updkit_errors::{Error, InstallError};
    use updkit_events::*;
    use updkit_types::UpdateVersion;

    #[tokio::test]
    async fn test_emitter_helpers() {
        let (tx, mut rx) = channel();

        tx.emit_error("test error");
        tx.emit_debug("test debug");

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first.event,
            AppEvent::General(GeneralEvent::Error { .. })
        ));
        assert_eq!(first.meta.level, EventLevel::Error);

        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second.event,
            AppEvent::General(GeneralEvent::DebugLog { .. })
        ));
        assert_eq!(second.meta.source, EventSource::GENERAL);
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        tx.emit_warning("ignored");
    }

    #[tokio::test]
    async fn test_correlated_emitter_stamps_id() {
        let (tx, mut rx) = channel();
        let emitter = CorrelatedEmitter::new(Some(tx), "session-42");
        emitter.emit(AppEvent::Download(DownloadEvent::Cancelled { completed: 1 }));

        let message = rx.recv().await.unwrap();
        assert_eq!(message.meta.correlation_id.as_deref(), Some("session-42"));
        assert_eq!(message.meta.source, EventSource::DOWNLOAD);
        assert_eq!(message.meta.level, EventLevel::Warn);
    }

    #[test]
    fn test_emitter_without_sender_is_silent() {
        let emitter = CorrelatedEmitter::new(None, "nobody");
        emitter.emit_error("dropped");
    }

    #[test]
    fn test_app_event_wire_format() {
        let event = AppEvent::Download(DownloadEvent::Progress {
            version: UpdateVersion::parse("1.2.0").unwrap(),
            bytes_received: 512,
            total_bytes: 1024,
            percentage: 50.0,
            bytes_per_second: 256.0,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["domain"], "download");
        assert_eq!(json["event"]["type"], "Progress");
        assert_eq!(json["event"]["version"], "1.2.0");
        assert_eq!(event.log_target(), "updkit::events::download");
        assert_eq!(event.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_failure_context_from_error() {
        let err: Error = InstallError::LockedResource {
            path: "app.exe".into(),
            attempts: 10,
        }
        .into();
        let failure = FailureContext::from_error(&err);
        assert_eq!(failure.code.as_deref(), Some("install.locked_resource"));
        assert!(failure.retryable);

        let event = AppEvent::Install(InstallEvent::OperationFailed { index: 2, failure });
        assert_eq!(event.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_rollback_level_depends_on_failures() {
        let clean = AppEvent::Publish(PublishEvent::RollbackCompleted {
            undone: 2,
            failed: vec![],
        });
        assert_eq!(clean.log_level(), tracing::Level::INFO);

        let partial = AppEvent::Publish(PublishEvent::RollbackCompleted {
            undone: 1,
            failed: vec!["upload".into()],
        });
        assert_eq!(partial.log_level(), tracing::Level::ERROR);
    }
}
