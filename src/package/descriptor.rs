//! Package descriptors: identity and metadata for one package instance.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::InstallError;
use crate::package::requirement::Requirement;
use crate::vcs::Backend;

/// Where a package came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageKind {
    /// Checked out from a version-control repository.
    #[default]
    Vc,
    /// Unpacked from a distributed archive.
    Archive,
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageKind::Vc => write!(f, "vc"),
            PackageKind::Archive => write!(f, "archive"),
        }
    }
}

impl FromStr for PackageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vc" => Ok(PackageKind::Vc),
            "archive" => Ok(PackageKind::Archive),
            other => anyhow::bail!("unknown package kind '{}'", other),
        }
    }
}

/// Where a vc-sourced package's code lives.
///
/// Produced once by spec resolution, consumed once by the installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    /// `None` means the backend was not stated (URL input) and the
    /// default backend applies at clone time.
    pub backend: Option<Backend>,
    pub location: String,
    pub subdir: Option<String>,
    pub branch: Option<String>,
}

impl Upstream {
    pub fn new(backend: Option<Backend>, location: impl Into<String>) -> Self {
        Upstream {
            backend,
            location: location.into(),
            subdir: None,
            branch: None,
        }
    }
}

/// Identity and metadata for one package instance.
///
/// Created by spec resolution with name and upstream only; the install
/// directory is set exclusively by the installer once a target is chosen,
/// and the version once the checkout has been inspected. The descriptor
/// becomes durable only when its file has been written.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDescriptor {
    pub name: String,
    pub kind: PackageKind,
    /// Install directory; owned exclusively by this descriptor once set.
    pub dir: Option<PathBuf>,
    pub summary: String,
    pub requirements: Vec<Requirement>,
    pub version: Option<String>,
    /// Required for `kind == Vc`; its absence is an error state, never
    /// silently defaulted.
    pub upstream: Option<Upstream>,
    /// Explicit revision override; takes priority over the upstream branch.
    pub rev: Option<String>,
    /// Raw repository spec string, used only during resolution.
    pub vc_spec: Option<String>,
    /// Open bag for anything else worth persisting.
    pub extras: BTreeMap<String, String>,
}

impl PackageDescriptor {
    /// A fresh vc-sourced descriptor: not installed, directory unset.
    pub fn vc(name: impl Into<String>, upstream: Upstream) -> Self {
        PackageDescriptor {
            name: name.into(),
            kind: PackageKind::Vc,
            dir: None,
            summary: String::new(),
            requirements: Vec::new(),
            version: None,
            upstream: Some(upstream),
            rev: None,
            vc_spec: None,
            extras: BTreeMap::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_rev(mut self, rev: Option<String>) -> Self {
        self.rev = rev;
        self
    }

    /// The upstream tuple, or `NoRepository` when the descriptor has none.
    pub fn upstream(&self) -> Result<&Upstream, InstallError> {
        self.upstream
            .as_ref()
            .ok_or_else(|| InstallError::NoRepository(self.name.clone()))
    }

    /// The revision to check out: explicit rev wins over the branch.
    pub fn effective_revision(&self) -> Option<&str> {
        self.rev
            .as_deref()
            .or_else(|| self.upstream.as_ref()?.branch.as_deref())
    }
}
