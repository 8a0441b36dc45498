//! Registry collaborators.
//!
//! The package index, the dependency transaction installer, and the
//! activation side of the registry are external subsystems; the installer
//! talks to them through these traits so tests can substitute fakes.

mod local;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::package::descriptor::PackageDescriptor;
use crate::package::requirement::Requirement;

pub use local::{LocalActivator, LocalIndex, NullTransactionInstaller};

/// One entry of the package index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RegistryEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub summary: String,
    /// Free-form metadata; a vc-installable entry carries a repository
    /// spec string under [`VC_HEADER`].
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
}

/// Key of the repository spec string in a registry entry's extras.
pub const VC_HEADER: &str = "vc";

impl RegistryEntry {
    pub fn vc_spec(&self) -> Option<&str> {
        self.extras.get(VC_HEADER).map(String::as_str)
    }
}

/// Read access to the package index.
#[cfg_attr(test, mockall::automock)]
pub trait RegistryIndex: Send + Sync {
    fn lookup(&self, name: &str) -> Option<RegistryEntry>;
}

/// The external dependency resolver/installer.
///
/// Given minimum-version requirements, it resolves, downloads, and
/// installs whatever is not already satisfied. Failures are surfaced to
/// the caller untouched; nothing here retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionInstaller: Send + Sync {
    async fn install_transaction(&self, requirements: &[Requirement]) -> Result<()>;
}

/// The activation side of the registry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Activator: Send + Sync {
    /// Re-read the canonical descriptor from an installed directory.
    fn load_descriptor(&self, dir: &Path) -> Result<PackageDescriptor>;

    /// Make the package available in the running process. `reload` replaces
    /// an already-active package of the same name; `deps` activates
    /// dependencies first. Returns whether activation happened.
    async fn activate(&self, desc: &PackageDescriptor, reload: bool, deps: bool) -> Result<bool>;

    /// Compile the package's sources.
    fn compile(&self, desc: &PackageDescriptor) -> Result<()>;

    /// Best-effort native compilation; the caller runs this in the
    /// background and ignores its outcome.
    async fn native_compile(&self, desc: &PackageDescriptor) -> Result<()>;

    /// Reload source units that were loaded under stale definitions.
    fn reload_stale(&self, desc: &PackageDescriptor) -> Result<()>;
}
