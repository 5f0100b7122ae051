use serde::{Deserialize, Serialize};
use updkit_types::UpdateVersion;

use super::FailureContext;

/// Events emitted while searching for updates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResolverEvent {
    SearchStarted {
        current_version: UpdateVersion,
        configuration_uri: String,
    },

    /// A configuration was not considered applicable
    CandidateSkipped {
        version: UpdateVersion,
        reason: SkipReason,
    },

    SearchCompleted {
        current_version: UpdateVersion,
        newest: Option<UpdateVersion>,
        update_count: usize,
        total_package_size: u64,
        necessary: bool,
    },

    SearchFailed {
        failure: FailureContext,
    },
}

/// Why a configuration was left out of the update set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotNewer,
    Architecture,
    PrereleaseNotAllowed,
    UnsupportedCurrentVersion,
    UnmetRequirement,
}
