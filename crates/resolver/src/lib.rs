#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Update resolution for updkit
//!
//! Decides which published configurations apply to the running application
//! and checks host requirements before anything is downloaded.

mod requirements;
mod resolver;

pub use requirements::{compare_dotted, host_is_64bit, unmet_requirements, HostInfo};
pub use resolver::{resolve, UpdateConfigurationResolver};

use serde::{Deserialize, Serialize};
use updkit_types::{UpdateConfiguration, UpdateVersion};

/// Caller policy for a resolution pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveOptions {
    pub allow_alpha: bool,
    pub allow_beta: bool,
    pub os_is_64bit: bool,
}

impl ResolveOptions {
    /// Options for the running host with pre-releases disabled
    #[must_use]
    pub fn for_host() -> Self {
        Self {
            allow_alpha: false,
            allow_beta: false,
            os_is_64bit: host_is_64bit(),
        }
    }
}

/// Outcome of a resolution pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub updates_found: bool,
    /// Applicable configurations, in input order
    pub configurations: Vec<UpdateConfiguration>,
}

impl UpdateResult {
    #[must_use]
    pub fn new(configurations: Vec<UpdateConfiguration>) -> Self {
        Self {
            updates_found: !configurations.is_empty(),
            configurations,
        }
    }

    /// Sum of the declared package sizes; packages without a size count as zero
    #[must_use]
    pub fn total_package_size(&self) -> u64 {
        self.configurations
            .iter()
            .filter_map(|c| c.package_size)
            .sum()
    }

    #[must_use]
    pub fn newest(&self) -> Option<&UpdateConfiguration> {
        self.configurations
            .iter()
            .max_by(|a, b| a.literal_version.cmp(&b.literal_version))
    }

    /// Whether any applicable configuration is marked necessary
    #[must_use]
    pub fn is_necessary(&self) -> bool {
        self.configurations.iter().any(|c| c.necessary_update)
    }

    #[must_use]
    pub fn versions(&self) -> Vec<UpdateVersion> {
        self.configurations
            .iter()
            .map(|c| c.literal_version.clone())
            .collect()
    }
}
