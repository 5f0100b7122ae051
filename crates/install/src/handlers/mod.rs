//! Operation handlers dispatched by `(area, method)`

mod files;
mod processes;
mod registry;

pub use files::FilesHandler;
pub use processes::ProcessesHandler;
pub use registry::RegistryHandler;

use crate::context::StepContext;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use updkit_errors::{Error, InstallError};
use updkit_types::{Operation, OperationArea, OperationMethod, SUPPORTED_OPERATIONS};

/// Applies one kind of operation
#[async_trait]
pub trait OperationHandler: Send + Sync + fmt::Debug {
    async fn execute(&self, step: &StepContext<'_>, operation: &Operation) -> Result<(), Error>;
}

/// Handler lookup keyed by `(area, method)`
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<(OperationArea, OperationMethod), Arc<dyn OperationHandler>>,
}

impl HandlerTable {
    /// Table with the built-in files, registry and processes handlers
    #[must_use]
    pub fn standard() -> Self {
        let files: Arc<dyn OperationHandler> = Arc::new(FilesHandler);
        let registry: Arc<dyn OperationHandler> = Arc::new(RegistryHandler);
        let processes: Arc<dyn OperationHandler> = Arc::new(ProcessesHandler);

        let mut table = Self::default();
        for &(area, method) in SUPPORTED_OPERATIONS {
            let handler = match area {
                OperationArea::Files => &files,
                OperationArea::Registry => &registry,
                OperationArea::Processes => &processes,
            };
            table.register(area, method, Arc::clone(handler));
        }
        table
    }

    /// Register or replace the handler for a pair
    pub fn register(
        &mut self,
        area: OperationArea,
        method: OperationMethod,
        handler: Arc<dyn OperationHandler>,
    ) {
        self.handlers.insert((area, method), handler);
    }

    /// # Errors
    ///
    /// Returns `InstallError::UnsupportedOperation` when no handler is registered.
    pub fn get(
        &self,
        area: OperationArea,
        method: OperationMethod,
    ) -> Result<&Arc<dyn OperationHandler>, Error> {
        self.handlers.get(&(area, method)).ok_or_else(|| {
            InstallError::UnsupportedOperation {
                area: area.to_string(),
                method: method.to_string(),
            }
            .into()
        })
    }
}

pub(crate) fn invalid_arguments(operation: &Operation, message: impl Into<String>) -> Error {
    InstallError::InvalidArguments {
        area: operation.area.to_string(),
        method: operation.method.to_string(),
        message: message.into(),
    }
    .into()
}

pub(crate) fn unsupported(operation: &Operation) -> Error {
    InstallError::UnsupportedOperation {
        area: operation.area.to_string(),
        method: operation.method.to_string(),
    }
    .into()
}
