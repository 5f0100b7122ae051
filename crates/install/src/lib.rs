#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Package installation for updkit
//!
//! Unpacks update packages and applies their declarative file, registry and
//! process operations in order, retrying file operations that race against
//! the application still releasing its handles.

mod archive;
mod context;
mod executor;
mod handlers;
mod installer;
mod placeholders;
mod registry_store;
mod retry;

pub use archive::{extract_package, safe_entry_path};
pub use context::{OperationContext, StepContext};
pub use executor::{ExecutionReport, ExecutionState, OperationExecutor};
pub use handlers::{
    FilesHandler, HandlerTable, OperationHandler, ProcessesHandler, RegistryHandler,
};
pub use installer::{Installer, InstallerConfig};
pub use placeholders::PathPlaceholders;
pub use registry_store::{FileRegistryStore, RegistryStore};
pub use retry::{is_locked, LockRetry};

pub use updkit_events::EventSender;
