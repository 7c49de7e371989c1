use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid {kind} version '{value}'")]
    Invalid { kind: &'static str, value: String },

    #[error("invalid version window: minimum {min} is newer than maximum {max}")]
    InvertedWindow { min: String, max: String },
}

/// Launcher and engine version: `major.minor[.patch]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlainVersion(semver::Version);

impl PlainVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    /// Missing components are zero and anything past the patch is ignored.
    pub fn parse(value: &str) -> Result<Self, VersionError> {
        let trimmed = value.trim();
        let invalid = || VersionError::Invalid {
            kind: "plain",
            value: value.to_string(),
        };
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let mut parts = [0_u64; 3];
        for (slot, token) in parts.iter_mut().zip(trimmed.split('.')) {
            *slot = token.trim().parse().map_err(|_| invalid())?;
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    pub fn as_semver(&self) -> &semver::Version {
        &self.0
    }
}

impl fmt::Display for PlainVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())?;
        if self.patch() != 0 {
            write!(f, ".{}", self.patch())?;
        }
        Ok(())
    }
}

impl FromStr for PlainVersion {
    type Err = VersionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for PlainVersion {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PlainVersion> for String {
    fn from(value: PlainVersion) -> Self {
        value.to_string()
    }
}

/// Version of this update engine, used when evaluating `exit,DistMaker,...` directives.
pub fn engine_version() -> PlainVersion {
    PlainVersion::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| PlainVersion::new(0, 0, 0))
}

/// Bundled runtime version. Accepts both the legacy `1.8.0_73` numbering and the
/// modern `17.0.2` numbering; the label is kept verbatim because it names directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RuntimeVersion {
    label: String,
    parts: Vec<u64>,
}

impl RuntimeVersion {
    pub fn parse(value: &str) -> Result<Self, VersionError> {
        let label = value.trim();
        let invalid = || VersionError::Invalid {
            kind: "runtime",
            value: value.to_string(),
        };
        if label.is_empty() {
            return Err(invalid());
        }

        let parts = label
            .split(['.', '_'])
            .map(|token| token.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            label: label.to_string(),
            parts,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Feature release number: `8` for `1.8.0_73`, `17` for `17.0.2`.
    pub fn feature_release(&self) -> u64 {
        match self.parts.as_slice() {
            [1, feature, ..] => *feature,
            [feature, ..] => *feature,
            [] => 0,
        }
    }
}

impl Ord for RuntimeVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        for (lhs, rhs) in self.parts.iter().zip(other.parts.iter()) {
            match lhs.cmp(rhs) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        // Shared prefix is equal; the more specific label is the newer one.
        self.parts.len().cmp(&other.parts.len())
    }
}

impl PartialOrd for RuntimeVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RuntimeVersion {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for RuntimeVersion {}

impl Hash for RuntimeVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl FromStr for RuntimeVersion {
    type Err = VersionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for RuntimeVersion {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RuntimeVersion> for String {
    fn from(value: RuntimeVersion) -> Self {
        value.label
    }
}

/// Inclusive `[min, max]` window; either bound may be open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionWindow<V> {
    min: Option<V>,
    max: Option<V>,
}

impl<V: Ord + fmt::Display> VersionWindow<V> {
    pub fn new(min: Option<V>, max: Option<V>) -> Result<Self, VersionError> {
        if let (Some(min), Some(max)) = (&min, &max) {
            if min > max {
                return Err(VersionError::InvertedWindow {
                    min: min.to_string(),
                    max: max.to_string(),
                });
            }
        }
        Ok(Self { min, max })
    }

    pub fn unbounded() -> Self {
        Self {
            min: None,
            max: None,
        }
    }

    pub fn min(&self) -> Option<&V> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&V> {
        self.max.as_ref()
    }

    pub fn is_too_old(&self, version: &V) -> bool {
        self.min.as_ref().is_some_and(|min| version < min)
    }

    pub fn is_too_new(&self, version: &V) -> bool {
        self.max.as_ref().is_some_and(|max| version > max)
    }

    pub fn contains(&self, version: &V) -> bool {
        !self.is_too_old(version) && !self.is_too_new(version)
    }
}

impl<V: fmt::Display> fmt::Display for VersionWindow<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.min, &self.max) {
            (Some(min), Some(max)) => write!(f, "[{min}, {max}]"),
            (Some(min), None) => write!(f, "[{min}, ..)"),
            (None, Some(max)) => write!(f, "(.., {max}]"),
            (None, None) => f.write_str("(..)"),
        }
    }
}
