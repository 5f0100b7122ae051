use serde::{Deserialize, Serialize};
use updkit_types::UpdateVersion;

use super::FailureContext;

/// Validation, extraction and operation execution events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InstallEvent {
    ValidationCompleted {
        version: UpdateVersion,
        valid: bool,
    },

    ExtractionCompleted {
        version: UpdateVersion,
        files: usize,
    },

    OperationStarted {
        index: usize,
        area: String,
        method: String,
        target: String,
    },

    OperationCompleted {
        index: usize,
    },

    /// A locked resource is being retried
    OperationRetrying {
        index: usize,
        path: String,
        attempt: u32,
    },

    OperationFailed {
        index: usize,
        failure: FailureContext,
    },

    Completed {
        operations: usize,
    },

    Cancelled {
        completed: usize,
    },
}
