//! Undo actions for multi-step side effects

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use updkit_errors::Error;

type UndoAction = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), Error>> + Send>;

/// Result of unwinding a [`CompensationStack`]
#[derive(Debug, Default)]
pub struct UnwindReport {
    /// Steps whose undo succeeded, in the order they were undone
    pub undone: Vec<String>,
    /// Steps whose undo failed, with the error
    pub failed: Vec<(String, Error)>,
}

impl UnwindReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Undo actions registered after each successful side effect
///
/// [`unwind`](Self::unwind) runs them newest first. A stack that is
/// dropped without unwinding discards its actions, which is how a
/// completed workflow commits.
#[derive(Default)]
pub struct CompensationStack {
    actions: Vec<(String, UndoAction)>,
}

impl fmt::Debug for CompensationStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompensationStack")
            .field("steps", &self.steps())
            .finish()
    }
}

impl CompensationStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the undo action for `step`
    pub fn push<F, Fut>(&mut self, step: impl Into<String>, undo: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.actions
            .push((step.into(), Box::new(move || Box::pin(undo()))));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Registered steps, oldest first
    #[must_use]
    pub fn steps(&self) -> Vec<&str> {
        self.actions.iter().map(|(step, _)| step.as_str()).collect()
    }

    /// Run every undo action in reverse order
    ///
    /// A failing undo does not stop the remaining ones.
    pub async fn unwind(mut self) -> UnwindReport {
        let mut report = UnwindReport::default();
        while let Some((step, undo)) = self.actions.pop() {
            match undo().await {
                Ok(()) => report.undone.push(step),
                Err(e) => {
                    tracing::debug!(step, error = %e, "undo failed");
                    report.failed.push((step, e));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_unwinds_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = CompensationStack::new();
        for step in ["sign", "upload_package", "upload_document"] {
            let log = Arc::clone(&log);
            stack.push(step, move || async move {
                log.lock().unwrap().push(step);
                Ok(())
            });
        }
        assert_eq!(stack.len(), 3);

        let report = stack.unwind().await;
        assert!(report.is_clean());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["upload_document", "upload_package", "sign"]
        );
        assert_eq!(report.undone, vec!["upload_document", "upload_package", "sign"]);
    }

    #[tokio::test]
    async fn test_failed_undo_does_not_stop_unwinding() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let mut stack = CompensationStack::new();
        let first = Arc::clone(&ran);
        stack.push("first", move || async move {
            first.lock().unwrap().push("first");
            Ok(())
        });
        stack.push("second", || async { Err(Error::internal("remote gone")) });

        let report = stack.unwind().await;
        assert_eq!(*ran.lock().unwrap(), vec!["first"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "second");
        assert_eq!(report.undone, vec!["first"]);
    }
}
