//! Shared state for operation handlers

use crate::placeholders::PathPlaceholders;
use crate::registry_store::RegistryStore;
use crate::retry::LockRetry;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use updkit_errors::Error;
use updkit_events::{AppEvent, EventEmitter, EventSender, InstallEvent};

/// Everything handlers need to apply one package's operations
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Extracted package contents that `Files/Create` copies from
    pub payload_dir: PathBuf,
    pub placeholders: PathPlaceholders,
    pub lock_retry: LockRetry,
    pub registry: Arc<dyn RegistryStore>,
}

impl OperationContext {
    #[must_use]
    pub fn new(
        payload_dir: impl Into<PathBuf>,
        placeholders: PathPlaceholders,
        registry: Arc<dyn RegistryStore>,
    ) -> Self {
        Self {
            payload_dir: payload_dir.into(),
            placeholders,
            lock_retry: LockRetry::default(),
            registry,
        }
    }

    #[must_use]
    pub fn with_lock_retry(mut self, lock_retry: LockRetry) -> Self {
        self.lock_retry = lock_retry;
        self
    }
}

/// The operation currently being executed
pub struct StepContext<'a> {
    pub index: usize,
    pub context: &'a OperationContext,
    tx: Option<&'a EventSender>,
}

impl EventEmitter for StepContext<'_> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx
    }
}

impl<'a> StepContext<'a> {
    #[must_use]
    pub fn new(index: usize, context: &'a OperationContext, tx: Option<&'a EventSender>) -> Self {
        Self { index, context, tx }
    }

    /// Expand placeholders in an operation target
    ///
    /// # Errors
    ///
    /// Returns `InstallError::UnknownPlaceholder` for undefined names.
    pub fn resolve(&self, target: &str) -> Result<PathBuf, Error> {
        self.context.placeholders.expand(target)
    }

    /// Run a file operation under the lock retry policy, reporting retries
    ///
    /// # Errors
    ///
    /// Returns `InstallError::LockedResource` when the target stays locked,
    /// or the underlying I/O error.
    pub async fn retry_locked<T, F, Fut>(&self, path: &Path, op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = io::Result<T>>,
    {
        self.context
            .lock_retry
            .run(path, op, |attempt| {
                self.emit(AppEvent::Install(InstallEvent::OperationRetrying {
                    index: self.index,
                    path: path.display().to_string(),
                    attempt,
                }));
            })
            .await
    }
}
