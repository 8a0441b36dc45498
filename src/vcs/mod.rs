//! Version-control capability.
//!
//! The installer only needs three operations from a backend: clone a
//! repository, move a working copy to a revision, and ask which commit a
//! file is at. Backends are identified by the token that appears in
//! repository spec strings; unknown tokens are preserved so specs
//! round-trip, and fail at clone time instead of parse time.

mod git;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use git::GitVcs;

/// Version-control backend token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Backend {
    #[default]
    Git,
    /// A backend token this build has no driver for.
    Other(String),
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Git => write!(f, "git"),
            Backend::Other(token) => write!(f, "{}", token),
        }
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => anyhow::bail!("empty backend token"),
            "git" => Ok(Backend::Git),
            other => Ok(Backend::Other(other.to_string())),
        }
    }
}

/// A checked-out repository on local disk.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingCopy {
    pub root: PathBuf,
}

/// Narrow interface to the version-control subsystem.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Clone `location` into `dest`. Returns the working copy, or an error
    /// when the backend produced no usable checkout.
    async fn clone_repo(&self, backend: &Backend, location: &str, dest: &Path)
    -> Result<WorkingCopy>;

    /// Move the working copy to a branch, tag, or commit.
    async fn checkout_revision(&self, copy: &WorkingCopy, rev: &str) -> Result<()>;

    /// The commit the given file is at in its working copy, if any.
    ///
    /// A per-file query; callers use it as a stand-in for a per-directory
    /// one and must tolerate `None`.
    async fn working_revision(&self, file: &Path) -> Option<String>;
}
