//! Update configuration records
//!
//! One record per published package. A remote configuration document is a
//! JSON array of these records with PascalCase field names.

use crate::operation::Operation;
use crate::version::UpdateVersion;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use updkit_errors::{Error, NetworkError};

/// Processor architecture a package targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Architecture {
    X86,
    X64,
    #[default]
    #[serde(rename = "AnyCPU", alias = "Any", alias = "AnyCpu")]
    AnyCpu,
}

impl Architecture {
    /// Whether a package for this architecture can run on the given OS bitness
    #[must_use]
    pub fn matches_os(self, os_is_64bit: bool) -> bool {
        match self {
            Self::X86 => !os_is_64bit,
            Self::X64 => os_is_64bit,
            Self::AnyCpu => true,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86 => write!(f, "x86"),
            Self::X64 => write!(f, "x64"),
            Self::AnyCpu => write!(f, "AnyCPU"),
        }
    }
}

/// Kind of host capability a package requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequirementKind {
    /// Minimum operating system version
    OsVersion,
    /// Minimum runtime version of the host application framework
    Runtime,
}

/// A minimum host version required to install a package
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateRequirement {
    pub kind: RequirementKind,
    /// Dotted numeric version, e.g. `10.0.17763`
    pub version: String,
}

/// Configuration of one published update package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateConfiguration {
    pub literal_version: UpdateVersion,
    #[serde(default)]
    pub architecture: Architecture,
    #[serde(default)]
    pub necessary_update: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unsupported_versions: Vec<UpdateVersion>,
    #[serde(default)]
    pub use_statistics: bool,
    #[serde(default)]
    pub version_id: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub changelog: BTreeMap<String, String>,
    pub update_package_uri: String,
    /// Detached minisign signature of the package
    #[serde(default)]
    pub signature: String,
    /// Statistics endpoint pinged after a successful download
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_php_file_uri: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub operations: Vec<Operation>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub requirements: Vec<UpdateRequirement>,
    /// Package size in bytes, when known at publish time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_size: Option<u64>,
}

impl UpdateConfiguration {
    /// Create a configuration with defaults for everything but version and package location
    pub fn new(literal_version: UpdateVersion, update_package_uri: impl Into<String>) -> Self {
        Self {
            literal_version,
            architecture: Architecture::AnyCpu,
            necessary_update: false,
            unsupported_versions: Vec::new(),
            use_statistics: false,
            version_id: 0,
            changelog: BTreeMap::new(),
            update_package_uri: update_package_uri.into(),
            signature: String::new(),
            update_php_file_uri: None,
            operations: Vec::new(),
            requirements: Vec::new(),
            package_size: None,
        }
    }

    /// Parse a configuration document (JSON array of records)
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::InvalidConfigurationDocument` when the document
    /// is not a valid array of configuration records.
    pub fn parse_document(document: &str) -> Result<Vec<Self>, Error> {
        if document.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(document).map_err(|e| {
            NetworkError::InvalidConfigurationDocument {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Serialize configurations into a document
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_document(configurations: &[Self]) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(configurations)?)
    }

    /// Changelog for a culture, falling back to the neutral language and then English
    #[must_use]
    pub fn changelog_for(&self, culture: &str) -> Option<&str> {
        let neutral = culture.split(['-', '_']).next().unwrap_or(culture);
        self.changelog
            .get(culture)
            .or_else(|| self.changelog.get(neutral))
            .or_else(|| self.changelog.get("en"))
            .map(String::as_str)
    }

    /// Whether the current version line is excluded from this update
    #[must_use]
    pub fn excludes(&self, current: &UpdateVersion) -> bool {
        let basic = current.basic_version();
        self.unsupported_versions
            .iter()
            .any(|unsupported| unsupported.basic_version() == basic)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
