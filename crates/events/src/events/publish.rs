use serde::{Deserialize, Serialize};
use updkit_types::UpdateVersion;

use super::FailureContext;

/// Publishing events, including compensation on failure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PublishEvent {
    Started {
        version: UpdateVersion,
        provider: String,
    },

    StepCompleted {
        step: String,
    },

    StepFailed {
        step: String,
        failure: FailureContext,
    },

    RollbackStarted {
        steps: usize,
    },

    /// Undo actions finished; `failed` lists the steps whose undo errored
    RollbackCompleted {
        undone: usize,
        failed: Vec<String>,
    },

    Completed {
        version: UpdateVersion,
    },

    Removed {
        version: UpdateVersion,
    },
}
