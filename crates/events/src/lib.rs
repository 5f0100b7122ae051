#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in updkit
//!
//! Library crates never print or log directly. They emit domain events over
//! an unbounded channel and the front end decides how to render them:
//! progress bars, plain lines, JSON or tracing records.

pub mod meta;
pub use meta::{EventLevel, EventMeta, EventSource};

pub mod events;
pub use events::{
    AppEvent, DownloadEvent, FailureContext, GeneralEvent, InstallEvent, PublishEvent,
    ResolverEvent, SkipReason,
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// An event together with its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub meta: EventMeta,
    pub event: AppEvent,
}

impl EventMessage {
    #[must_use]
    pub fn new(meta: EventMeta, event: AppEvent) -> Self {
        Self { meta, event }
    }

    /// Wrap an event with metadata derived from its domain and severity
    #[must_use]
    pub fn from_event(event: AppEvent) -> Self {
        let meta = EventMeta::new(event.log_level(), event.event_source());
        Self { meta, event }
    }
}

pub type EventSender = UnboundedSender<EventMessage>;

pub type EventReceiver = UnboundedReceiver<EventMessage>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events
///
/// Implemented by the raw `EventSender` and by any context struct that holds
/// one. Emission never fails: a dropped receiver silently discards events.
pub trait EventEmitter {
    fn event_sender(&self) -> Option<&EventSender>;

    /// Correlation id stamped on every event emitted through this emitter
    fn correlation_id(&self) -> Option<&str> {
        None
    }

    fn emit(&self, event: AppEvent) {
        let mut meta = EventMeta::new(event.log_level(), event.event_source());
        if let Some(id) = self.correlation_id() {
            meta = meta.with_correlation_id(id);
        }
        self.emit_with_meta(meta, event);
    }

    fn emit_with_meta(&self, meta: EventMeta, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            let _ = sender.send(EventMessage::new(meta, event));
        }
    }

    fn emit_debug(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::debug(message)));
    }

    fn emit_warning(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message)));
    }

    fn emit_warning_with_context(&self, message: impl Into<String>, context: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning_with_context(
            message, context,
        )));
    }

    fn emit_error(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error(message)));
    }

    fn emit_operation_started(&self, operation: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::OperationStarted {
            operation: operation.into(),
        }));
    }

    fn emit_operation_completed(&self, operation: impl Into<String>, success: bool) {
        self.emit(AppEvent::General(GeneralEvent::OperationCompleted {
            operation: operation.into(),
            success,
        }));
    }

    fn emit_operation_failed(&self, operation: impl Into<String>, error: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::OperationFailed {
            operation: operation.into(),
            error: error.into(),
        }));
    }
}

impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}

/// Emitter that stamps a correlation id on everything it sends
#[derive(Debug, Clone)]
pub struct CorrelatedEmitter {
    sender: Option<EventSender>,
    correlation_id: String,
}

impl CorrelatedEmitter {
    #[must_use]
    pub fn new(sender: Option<EventSender>, correlation_id: impl Into<String>) -> Self {
        Self {
            sender,
            correlation_id: correlation_id.into(),
        }
    }
}

impl EventEmitter for CorrelatedEmitter {
    fn event_sender(&self) -> Option<&EventSender> {
        self.sender.as_ref()
    }

    fn correlation_id(&self) -> Option<&str> {
        Some(&self.correlation_id)
    }
}
