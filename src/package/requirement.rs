//! Dependency requirements and comparable version tuples.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A dotted numeric version, comparable component-wise.
///
/// `"1.2"` parses to `[1, 2]`; comparison is lexicographic, so
/// `1.2 < 1.2.1 < 1.10`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionTuple(Vec<u64>);

#[derive(Debug, Error, PartialEq)]
#[error("invalid version '{0}': expected dot-separated numbers")]
pub struct InvalidVersion(pub String);

impl VersionTuple {
    pub fn components(&self) -> &[u64] {
        &self.0
    }
}

impl FromStr for VersionTuple {
    type Err = InvalidVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(InvalidVersion(s.to_string()));
        }
        let components = trimmed
            .split('.')
            .map(|part| part.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| InvalidVersion(s.to_string()))?;
        Ok(VersionTuple(components))
    }
}

impl fmt::Display for VersionTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .0
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{}", rendered)
    }
}

/// One declared dependency: a package name and its minimum version.
///
/// Identity is by name; see [`dedup`] for how duplicate declarations
/// across source files are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub min_version: VersionTuple,
}

impl Requirement {
    pub fn new(name: impl Into<String>, min_version: VersionTuple) -> Self {
        Requirement {
            name: name.into(),
            min_version,
        }
    }
}

/// Merge duplicate requirement names, keeping the highest minimum version.
///
/// The first occurrence of a name keeps its position; a later, higher
/// minimum replaces the version in place. Any lower minimum is already
/// satisfied by the higher one, so nothing is lost.
pub fn dedup(requirements: Vec<Requirement>) -> Vec<Requirement> {
    let mut merged: Vec<Requirement> = Vec::with_capacity(requirements.len());
    for req in requirements {
        match merged.iter_mut().find(|r| r.name == req.name) {
            Some(existing) => {
                if req.min_version > existing.min_version {
                    existing.min_version = req.min_version;
                }
            }
            None => merged.push(req),
        }
    }
    merged
}
