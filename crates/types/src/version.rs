//! Update version parsing and ordering
//!
//! Versions follow the grammar `major.minor.build[.revision][-stage[N]]`:
//! - `1.2.3` / `1.2.3.4` - Release
//! - `1.2.3-alpha`, `1.2.3-a2` - Alpha (optionally numbered)
//! - `1.2.3-beta2`, `1.2.3-b.2` - Beta
//! - `1.2.3-rc1` - Release candidate
//!
//! Ordering compares the numeric components first (a missing revision sorts
//! below any present one), then the development stage, then the development
//! build number.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use updkit_errors::VersionError;

/// Pre-release tier of a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DevelopmentStage {
    Alpha,
    Beta,
    ReleaseCandidate,
    Release,
}

impl DevelopmentStage {
    fn suffix(self) -> Option<&'static str> {
        match self {
            Self::Alpha => Some("alpha"),
            Self::Beta => Some("beta"),
            Self::ReleaseCandidate => Some("rc"),
            Self::Release => None,
        }
    }

    fn from_suffix(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "alpha" | "a" => Some(Self::Alpha),
            "beta" | "b" => Some(Self::Beta),
            "rc" | "releasecandidate" => Some(Self::ReleaseCandidate),
            _ => None,
        }
    }

    /// Whether this stage is a pre-release tier
    #[must_use]
    pub fn is_prerelease(self) -> bool {
        self != Self::Release
    }
}

impl fmt::Display for DevelopmentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alpha => write!(f, "Alpha"),
            Self::Beta => write!(f, "Beta"),
            Self::ReleaseCandidate => write!(f, "ReleaseCandidate"),
            Self::Release => write!(f, "Release"),
        }
    }
}

/// The numeric-only part of a version, used for unsupported-version matching.
///
/// A missing revision is normalized to zero so `1.0.0` and `1.0.0.0` name
/// the same numeric line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BasicVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl fmt::Display for BasicVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// A parsed, immutable update version.
///
/// Field order matters: the derived ordering is lexicographic over
/// (major, minor, build, revision, stage, development build).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UpdateVersion {
    major: u32,
    minor: u32,
    build: u32,
    revision: Option<u32>,
    stage: DevelopmentStage,
    development_build: Option<u32>,
}

impl UpdateVersion {
    /// Create a release version without revision
    #[must_use]
    pub fn new(major: u32, minor: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision: None,
            stage: DevelopmentStage::Release,
            development_build: None,
        }
    }

    /// Set the revision component
    #[must_use]
    pub fn with_revision(mut self, revision: u32) -> Self {
        self.revision = Some(revision);
        self
    }

    /// Set the development stage and optional build number.
    ///
    /// A release never carries a development build number.
    #[must_use]
    pub fn with_stage(mut self, stage: DevelopmentStage, development_build: Option<u32>) -> Self {
        self.stage = stage;
        self.development_build = if stage.is_prerelease() {
            development_build
        } else {
            None
        };
        self
    }

    /// Parse a version literal
    ///
    /// # Errors
    ///
    /// Returns `VersionError::InvalidVersion` if the literal does not match
    /// the grammar, or `ComponentOutOfRange` if a number does not fit.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidVersion {
            input: input.to_string(),
        };
        let trimmed = input.trim();

        let (numeric, suffix) = match trimmed.split_once('-') {
            Some((numeric, suffix)) => (numeric, Some(suffix)),
            None => (trimmed, None),
        };

        let parts: Vec<&str> = numeric.split('.').collect();
        if !(3..=4).contains(&parts.len()) {
            return Err(invalid());
        }

        let mut numbers = Vec::with_capacity(parts.len());
        for part in &parts {
            numbers.push(parse_component(input, part)?);
        }

        let mut version = Self::new(numbers[0], numbers[1], numbers[2]);
        if let Some(revision) = numbers.get(3) {
            version.revision = Some(*revision);
        }

        if let Some(suffix) = suffix {
            let split_at = suffix
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(suffix.len());
            let (label, rest) = suffix.split_at(split_at);
            let stage = DevelopmentStage::from_suffix(label).ok_or_else(invalid)?;
            let rest = match rest.strip_prefix('.') {
                Some("") => return Err(invalid()),
                Some(number) => number,
                None => rest,
            };
            let development_build = if rest.is_empty() {
                None
            } else {
                Some(parse_component(input, rest)?)
            };
            version = version.with_stage(stage, development_build);
        }

        Ok(version)
    }

    #[must_use]
    pub fn major(&self) -> u32 {
        self.major
    }

    #[must_use]
    pub fn minor(&self) -> u32 {
        self.minor
    }

    #[must_use]
    pub fn build(&self) -> u32 {
        self.build
    }

    #[must_use]
    pub fn revision(&self) -> Option<u32> {
        self.revision
    }

    #[must_use]
    pub fn stage(&self) -> DevelopmentStage {
        self.stage
    }

    #[must_use]
    pub fn development_build(&self) -> Option<u32> {
        self.development_build
    }

    /// The numeric component, independent of development stage
    #[must_use]
    pub fn basic_version(&self) -> BasicVersion {
        BasicVersion {
            major: self.major,
            minor: self.minor,
            build: self.build,
            revision: self.revision.unwrap_or(0),
        }
    }

    /// Highest version of the set, `None` when the set is empty
    pub fn highest<I>(versions: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        versions.into_iter().max()
    }

    /// Lowest version of the set, `None` when the set is empty
    pub fn lowest<I>(versions: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        versions.into_iter().min()
    }
}

fn parse_component(input: &str, part: &str) -> Result<u32, VersionError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionError::InvalidVersion {
            input: input.to_string(),
        });
    }
    part.parse().map_err(|_| VersionError::ComponentOutOfRange {
        input: input.to_string(),
        component: part.to_string(),
    })
}

impl fmt::Display for UpdateVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)?;
        if let Some(revision) = self.revision {
            write!(f, ".{revision}")?;
        }
        if let Some(suffix) = self.stage.suffix() {
            write!(f, "-{suffix}")?;
            if let Some(n) = self.development_build {
                write!(f, "{n}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for UpdateVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for UpdateVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UpdateVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> UpdateVersion {
        UpdateVersion::parse(s).unwrap()
    }

    #[test]
    fn test_parse_release() {
        let version = v("1.2.3");
        assert_eq!(version.major(), 1);
        assert_eq!(version.minor(), 2);
        assert_eq!(version.build(), 3);
        assert_eq!(version.revision(), None);
        assert_eq!(version.stage(), DevelopmentStage::Release);
        assert_eq!(v("1.2.3.4").revision(), Some(4));
    }

    #[test]
    fn test_parse_stages() {
        assert_eq!(v("2.0.0-alpha").stage(), DevelopmentStage::Alpha);
        assert_eq!(v("2.0.0-a3").development_build(), Some(3));
        assert_eq!(v("2.0.0-Beta.2").stage(), DevelopmentStage::Beta);
        assert_eq!(v("2.0.0-beta.2").development_build(), Some(2));
        assert_eq!(v("2.0.0-rc1").stage(), DevelopmentStage::ReleaseCandidate);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in [
            "", "1", "1.2", "1.2.3.4.5", "1..3", "1.2.x", "1.2.3-", "1.2.3-gamma", "1.2.3-beta-2",
            "-1.2.3", "1.2.3-beta.",
        ] {
            assert!(
                matches!(
                    UpdateVersion::parse(input),
                    Err(VersionError::InvalidVersion { .. })
                ),
                "{input} should be rejected"
            );
        }
        assert!(matches!(
            UpdateVersion::parse("1.2.99999999999"),
            Err(VersionError::ComponentOutOfRange { .. })
        ));
    }

    #[test]
    fn test_ordering() {
        assert!(v("1.0.0") < v("1.0.1"));
        assert!(v("1.0.9") < v("1.1.0"));
        assert!(v("1.0.0") < v("1.0.0.0"));
        assert!(v("1.0.0.1") < v("1.0.1"));
        assert!(v("2.0.0-alpha") < v("2.0.0-beta"));
        assert!(v("2.0.0-beta") < v("2.0.0-rc"));
        assert!(v("2.0.0-rc") < v("2.0.0"));
        assert!(v("2.0.0-beta1") < v("2.0.0-beta2"));
        assert!(v("2.0.0-beta") < v("2.0.0-beta1"));
        assert!(v("1.9.9") < v("2.0.0-alpha"));
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!(v("1.2.3").to_string(), "1.2.3");
        assert_eq!(v("1.2.3.0").to_string(), "1.2.3.0");
        assert_eq!(v("1.2.3-B.2").to_string(), "1.2.3-beta2");
        assert_eq!(v("1.2.3-a").to_string(), "1.2.3-alpha");
        assert_eq!(v("1.2.3-ReleaseCandidate4").to_string(), "1.2.3-rc4");
    }

    #[test]
    fn test_basic_version_ignores_stage() {
        assert_eq!(v("1.1.0-beta2").basic_version(), v("1.1.0").basic_version());
        assert_eq!(v("1.1.0").basic_version(), v("1.1.0.0").basic_version());
        assert_ne!(v("1.1.0").basic_version(), v("1.1.1").basic_version());
    }

    #[test]
    fn test_highest_and_lowest() {
        let versions = vec![v("1.1.0"), v("2.0.0-beta"), v("1.0.0"), v("2.0.0-alpha")];
        assert_eq!(UpdateVersion::highest(versions.clone()), Some(v("2.0.0-beta")));
        assert_eq!(UpdateVersion::lowest(versions), Some(v("1.0.0")));
        assert_eq!(UpdateVersion::highest(Vec::new()), None);
    }

    #[test]
    fn test_release_drops_development_build() {
        let version = UpdateVersion::new(1, 0, 0).with_stage(DevelopmentStage::Release, Some(4));
        assert_eq!(version.development_build(), None);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&v("1.0.0-rc2")).unwrap();
        assert_eq!(json, r#""1.0.0-rc2""#);
        let back: UpdateVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v("1.0.0-rc2"));
        assert!(serde_json::from_str::<UpdateVersion>(r#""nope""#).is_err());
    }
}
