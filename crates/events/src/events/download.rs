use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use updkit_types::UpdateVersion;

use super::FailureContext;

/// Package transfer events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DownloadEvent {
    BatchStarted {
        packages: usize,
        total_bytes: Option<u64>,
    },

    Started {
        url: String,
        version: UpdateVersion,
        total_size: Option<u64>,
    },

    /// Batch-wide progress, throttled by the transfer controller
    Progress {
        version: UpdateVersion,
        bytes_received: u64,
        total_bytes: u64,
        percentage: f32,
        bytes_per_second: f64,
    },

    Completed {
        version: UpdateVersion,
        path: PathBuf,
        final_size: u64,
        /// BLAKE3 digest of the downloaded file, hex encoded
        blake3: String,
    },

    Failed {
        url: String,
        version: UpdateVersion,
        failure: FailureContext,
    },

    Cancelled {
        completed: usize,
    },

    BatchCompleted {
        packages: usize,
        total_bytes: u64,
    },
}
