//! Sequential operation execution

use crate::context::{OperationContext, StepContext};
use crate::handlers::HandlerTable;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use updkit_errors::{Error, InstallError};
use updkit_events::{AppEvent, EventEmitter, EventSender, FailureContext, InstallEvent};
use updkit_types::Operation;

/// Progress of an operation list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExecutionState {
    Pending,
    Running { index: usize },
    Succeeded,
    Failed { index: usize, cause: String },
    Cancelled { completed: usize },
}

impl ExecutionState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// Outcome of a run that did not fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Indices of the operations that completed, in order
    pub completed: Vec<usize>,
    pub state: ExecutionState,
}

impl ExecutionReport {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.state, ExecutionState::Cancelled { .. })
    }
}

/// Applies an operation list in declared order
///
/// Not reentrant: one list at a time per target set.
#[derive(Debug)]
pub struct OperationExecutor {
    handlers: HandlerTable,
    context: OperationContext,
    state: ExecutionState,
    tx: Option<EventSender>,
}

impl EventEmitter for OperationExecutor {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl OperationExecutor {
    /// Executor with the standard handler table
    #[must_use]
    pub fn new(context: OperationContext, tx: Option<EventSender>) -> Self {
        Self::with_handlers(HandlerTable::standard(), context, tx)
    }

    #[must_use]
    pub fn with_handlers(
        handlers: HandlerTable,
        context: OperationContext,
        tx: Option<EventSender>,
    ) -> Self {
        Self {
            handlers,
            context,
            state: ExecutionState::Pending,
            tx,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    #[must_use]
    pub fn context(&self) -> &OperationContext {
        &self.context
    }

    /// Run `operations` strictly in order
    ///
    /// Every `(area, method)` pair is checked before anything runs. The
    /// cancellation token is checked before each operation. Operations that
    /// completed before a failure are left in place.
    ///
    /// # Errors
    ///
    /// Returns `InstallError::UnsupportedOperation` if a pair has no
    /// handler, or `InstallError::OperationFailed` carrying the index of the
    /// first operation that failed.
    pub async fn execute(
        &mut self,
        operations: &[Operation],
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport, Error> {
        self.state = ExecutionState::Pending;

        let mut steps = Vec::with_capacity(operations.len());
        for operation in operations {
            steps.push(self.handlers.get(operation.area, operation.method)?.clone());
        }

        let mut completed = Vec::with_capacity(operations.len());
        for (index, (operation, handler)) in operations.iter().zip(steps).enumerate() {
            if cancel.is_cancelled() {
                self.state = ExecutionState::Cancelled {
                    completed: completed.len(),
                };
                self.emit(AppEvent::Install(InstallEvent::Cancelled {
                    completed: completed.len(),
                }));
                return Ok(ExecutionReport {
                    completed,
                    state: self.state.clone(),
                });
            }

            self.state = ExecutionState::Running { index };
            self.emit(AppEvent::Install(InstallEvent::OperationStarted {
                index,
                area: operation.area.to_string(),
                method: operation.method.to_string(),
                target: operation.target.clone(),
            }));

            let step = StepContext::new(index, &self.context, self.tx.as_ref());
            if let Err(cause) = handler.execute(&step, operation).await {
                tracing::debug!(index, %operation, error = %cause, "operation failed");
                self.emit(AppEvent::Install(InstallEvent::OperationFailed {
                    index,
                    failure: FailureContext::from_error(&cause),
                }));
                self.state = ExecutionState::Failed {
                    index,
                    cause: cause.to_string(),
                };
                return Err(InstallError::OperationFailed {
                    index,
                    area: operation.area.to_string(),
                    method: operation.method.to_string(),
                    message: cause.to_string(),
                }
                .into());
            }

            self.emit(AppEvent::Install(InstallEvent::OperationCompleted { index }));
            completed.push(index);
        }

        self.state = ExecutionState::Succeeded;
        self.emit(AppEvent::Install(InstallEvent::Completed {
            operations: completed.len(),
        }));
        Ok(ExecutionReport {
            completed,
            state: ExecutionState::Succeeded,
        })
    }
}
