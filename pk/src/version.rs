//! Version specs and fetch-key resolution
//!
//! A manager is built for one `VersionSpec`. The spec is validated once at
//! construction and resolved into the concrete `FetchKey`s the registry is
//! asked for.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PromptError;

/// Literal naming the mutable staging slot
pub const UNDEPLOYED: &str = "undeployed";

/// Sentinel minor meaning "resolve on the server"
pub const LATEST: &str = "latest";

/// Major version a manager is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MajorVersion {
    /// A deployed major version number
    Deployed(u32),
    /// Whatever is currently staged
    Undeployed,
    /// A literal `major.minor` pin
    Pinned { major: u32, minor: u32 },
}

impl MajorVersion {
    /// Major number, when there is one
    pub fn number(&self) -> Option<u32> {
        match self {
            MajorVersion::Deployed(major) | MajorVersion::Pinned { major, .. } => Some(*major),
            MajorVersion::Undeployed => None,
        }
    }

    pub fn is_undeployed(&self) -> bool {
        matches!(self, MajorVersion::Undeployed)
    }
}

impl fmt::Display for MajorVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MajorVersion::Deployed(major) => write!(f, "{}", major),
            MajorVersion::Undeployed => write!(f, "{}", UNDEPLOYED),
            MajorVersion::Pinned { major, minor } => write!(f, "{}.{}", major, minor),
        }
    }
}

impl FromStr for MajorVersion {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid(s, "major version is empty"));
        }
        if trimmed == UNDEPLOYED {
            return Ok(MajorVersion::Undeployed);
        }
        match trimmed.split_once('.') {
            Some((major, minor)) => Ok(MajorVersion::Pinned {
                major: parse_number(s, major, "major")?,
                minor: parse_number(s, minor, "minor")?,
            }),
            None => Ok(MajorVersion::Deployed(parse_number(s, trimmed, "major")?)),
        }
    }
}

/// One entry of a weighted minor set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedMinor {
    pub version: u32,
    pub weight: f64,
}

impl WeightedMinor {
    pub fn new(version: u32, weight: f64) -> Self {
        Self { version, weight }
    }
}

/// Minor version within a major
#[derive(Debug, Clone, PartialEq)]
pub enum MinorVersion {
    /// Resolve dynamically, reconciled on every refresh
    Latest,
    /// Exactly this minor, cached indefinitely
    Exact(u32),
    /// Pick one of several exact minors per `get()`
    Weighted(Vec<WeightedMinor>),
}

impl fmt::Display for MinorVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinorVersion::Latest => write!(f, "{}", LATEST),
            MinorVersion::Exact(minor) => write!(f, "{}", minor),
            MinorVersion::Weighted(entries) => {
                let parts: Vec<String> = entries.iter().map(|w| format!("{}:{}", w.version, w.weight)).collect();
                write!(f, "[{}]", parts.join(","))
            }
        }
    }
}

impl FromStr for MinorVersion {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid(s, "minor version is empty"));
        }
        if trimmed == LATEST {
            return Ok(MinorVersion::Latest);
        }
        Ok(MinorVersion::Exact(parse_number(s, trimmed, "minor")?))
    }
}

/// A validated (major, minor) request
#[derive(Debug, Clone, PartialEq)]
pub struct VersionSpec {
    major: MajorVersion,
    minor: MinorVersion,
}

impl VersionSpec {
    /// Validate a major/minor combination
    pub fn new(major: MajorVersion, minor: MinorVersion) -> Result<Self, PromptError> {
        debug!(%major, %minor, "VersionSpec::new: called");
        let label = format!("{}/{}", major, minor);
        match (&major, &minor) {
            (MajorVersion::Pinned { minor: pinned, .. }, MinorVersion::Exact(explicit)) if pinned != explicit => {
                return Err(invalid(
                    &label,
                    &format!("pinned minor {} conflicts with explicit minor {}", pinned, explicit),
                ));
            }
            (MajorVersion::Pinned { .. }, MinorVersion::Weighted(_)) => {
                return Err(invalid(&label, "a pinned version cannot carry weighted minors"));
            }
            (MajorVersion::Undeployed, MinorVersion::Weighted(_)) => {
                return Err(invalid(&label, "weighted minors require a deployed major version"));
            }
            (MajorVersion::Deployed(_), MinorVersion::Weighted(entries)) => {
                if entries.is_empty() {
                    return Err(invalid(&label, "weighted minor set is empty"));
                }
                if let Some(bad) = entries.iter().find(|w| !(w.weight.is_finite() && w.weight > 0.0)) {
                    return Err(invalid(
                        &label,
                        &format!("weight {} for minor {} must be positive", bad.weight, bad.version),
                    ));
                }
            }
            _ => {}
        }
        Ok(Self { major, minor })
    }

    /// Parse and validate string forms, e.g. `("1", "latest")` or `("1.3", "latest")`
    pub fn parse(major: &str, minor: &str) -> Result<Self, PromptError> {
        Self::new(major.parse()?, minor.parse()?)
    }

    /// Latest minor of a deployed major
    pub fn latest(major: u32) -> Self {
        Self {
            major: MajorVersion::Deployed(major),
            minor: MinorVersion::Latest,
        }
    }

    /// Exactly `major.minor`
    pub fn exact(major: u32, minor: u32) -> Self {
        Self {
            major: MajorVersion::Deployed(major),
            minor: MinorVersion::Exact(minor),
        }
    }

    /// The undeployed staging slot
    pub fn undeployed() -> Self {
        Self {
            major: MajorVersion::Undeployed,
            minor: MinorVersion::Latest,
        }
    }

    pub fn major(&self) -> &MajorVersion {
        &self.major
    }

    pub fn minor(&self) -> &MinorVersion {
        &self.minor
    }

    /// Resolve into weighted fetch keys
    ///
    /// Every spec but a weighted one resolves to a single key with weight 1.
    pub fn resolve(&self) -> Vec<(FetchKey, f64)> {
        match (&self.major, &self.minor) {
            (MajorVersion::Undeployed, _) => vec![(FetchKey::Undeployed, 1.0)],
            (MajorVersion::Pinned { major, minor }, _) => vec![(
                FetchKey::Exact {
                    major: *major,
                    minor: *minor,
                },
                1.0,
            )],
            (MajorVersion::Deployed(major), MinorVersion::Latest) => {
                vec![(FetchKey::LatestMinor { major: *major }, 1.0)]
            }
            (MajorVersion::Deployed(major), MinorVersion::Exact(minor)) => vec![(
                FetchKey::Exact {
                    major: *major,
                    minor: *minor,
                },
                1.0,
            )],
            (MajorVersion::Deployed(major), MinorVersion::Weighted(entries)) => entries
                .iter()
                .map(|w| {
                    (
                        FetchKey::Exact {
                            major: *major,
                            minor: w.version,
                        },
                        w.weight,
                    )
                })
                .collect(),
        }
    }

    /// Whether the resolved content can change on the server
    pub fn is_mutable(&self) -> bool {
        self.resolve().iter().any(|(key, _)| key.is_mutable())
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.major {
            MajorVersion::Undeployed | MajorVersion::Pinned { .. } => write!(f, "{}", self.major),
            MajorVersion::Deployed(_) => write!(f, "{}.{}", self.major, self.minor),
        }
    }
}

/// The concrete key a registry is asked for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchKey {
    LatestMinor { major: u32 },
    Exact { major: u32, minor: u32 },
    Undeployed,
}

impl FetchKey {
    /// Path segment for the major version
    pub fn major_segment(&self) -> String {
        match self {
            FetchKey::LatestMinor { major } | FetchKey::Exact { major, .. } => major.to_string(),
            FetchKey::Undeployed => UNDEPLOYED.to_string(),
        }
    }

    /// Path segment for the minor version
    pub fn minor_segment(&self) -> String {
        match self {
            FetchKey::Exact { minor, .. } => minor.to_string(),
            FetchKey::LatestMinor { .. } | FetchKey::Undeployed => LATEST.to_string(),
        }
    }

    /// Latest and undeployed keys are reconciled by the refresher
    pub fn is_mutable(&self) -> bool {
        !matches!(self, FetchKey::Exact { .. })
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchKey::Undeployed => write!(f, "{}", UNDEPLOYED),
            _ => write!(f, "{}.{}", self.major_segment(), self.minor_segment()),
        }
    }
}

fn parse_number(spec: &str, part: &str, what: &str) -> Result<u32, PromptError> {
    if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid(spec, &format!("{} version '{}' is not a number", what, part)));
    }
    part.parse::<u32>()
        .map_err(|e| invalid(spec, &format!("{} version '{}': {}", what, part, e)))
}

fn invalid(spec: &str, reason: &str) -> PromptError {
    PromptError::InvalidVersionSpec {
        spec: spec.to_string(),
        reason: reason.to_string(),
    }
}
