//! The install pipeline.
//!
//! Turns a resolved descriptor into an activated on-disk package:
//! clone, checkout, dependency extraction, dependency transaction,
//! descriptor generation, activation. Steps run strictly in order and
//! fail fast; there is no partial-state rollback, so a late failure
//! leaves the checkout on disk for inspection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use log::{info, warn};
use tokio::sync::Mutex as TokioMutex;

use crate::error::InstallError;
use crate::extract;
use crate::package::descriptor::{PackageDescriptor, Upstream};
use crate::package::requirement::{self, Requirement};
use crate::package::writer;
use crate::registry::{Activator, TransactionInstaller};
use crate::runtime::Runtime;
use crate::vcs::Vcs;
use crate::version::{FileOrder, VersionResolver};

/// Suffix of checkout directories under the install root.
pub const CHECKOUT_SUFFIX: &str = "-vc";

/// What to do when the target directory already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overwrite {
    /// Prompt through the runtime.
    #[default]
    Ask,
    /// Overwrite without asking.
    Always,
    /// Fail without asking.
    Never,
}

pub struct Installer<R, V, T, A>
where
    R: Runtime,
    V: Vcs,
    T: TransactionInstaller,
    A: Activator + 'static,
{
    runtime: Arc<R>,
    vcs: Arc<V>,
    transactions: Arc<T>,
    activator: Arc<A>,
    root: PathBuf,
    overwrite: Overwrite,
    deadline: Option<Duration>,
    versions: VersionResolver,
    // Installs of the same name must not interleave; the existence check
    // below is not atomic against a concurrent second install.
    locks: StdMutex<HashMap<String, Arc<TokioMutex<()>>>>,
}

impl<R, V, T, A> Installer<R, V, T, A>
where
    R: Runtime,
    V: Vcs,
    T: TransactionInstaller,
    A: Activator + 'static,
{
    pub fn new(
        runtime: Arc<R>,
        vcs: Arc<V>,
        transactions: Arc<T>,
        activator: Arc<A>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Installer {
            runtime,
            vcs,
            transactions,
            activator,
            root: root.into(),
            overwrite: Overwrite::default(),
            deadline: None,
            versions: VersionResolver::default(),
            locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn with_overwrite(mut self, overwrite: Overwrite) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Bound clone and checkout; backend network calls can hang forever.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_file_order(mut self, order: FileOrder) -> Self {
        self.versions = VersionResolver::new(order);
        self
    }

    /// Target checkout directory for a package name.
    pub fn target_dir(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}{}", name, CHECKOUT_SUFFIX))
    }

    fn name_lock(&self, name: &str) -> Arc<TokioMutex<()>> {
        let mut locks = self.locks.lock().expect("lock table");
        locks.entry(name.to_string()).or_default().clone()
    }

    async fn bounded<F, O>(&self, fut: F) -> anyhow::Result<O>
    where
        F: Future<Output = anyhow::Result<O>>,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, fut)
                .await
                .map_err(|_| anyhow::anyhow!("timed out after {:?}", deadline))?,
            None => fut.await,
        }
    }

    /// Ensure the target directory is free, prompting per the overwrite
    /// policy. Deletion is wholesale and irrecoverable.
    fn claim_target(&self, name: &str, target: &Path) -> Result<(), InstallError> {
        if !self.runtime.exists(target) {
            return Ok(());
        }
        let confirmed = match self.overwrite {
            Overwrite::Always => true,
            Overwrite::Never => false,
            Overwrite::Ask => self.runtime.confirm(&format!(
                "Package '{}' is already checked out at {}. Overwrite?",
                name,
                target.display()
            ))?,
        };
        if !confirmed {
            return Err(InstallError::AlreadyInstalled {
                name: name.to_string(),
                dir: target.to_path_buf(),
            });
        }
        info!("removing previous checkout {}", target.display());
        self.runtime.remove_dir_all(target)?;
        Ok(())
    }

    fn extract_requirements(&self, dir: &Path) -> Result<Vec<Requirement>, InstallError> {
        let raw = extract::requirements(self.runtime.as_ref(), dir)?;
        let mut parsed = Vec::with_capacity(raw.len());
        for (name, version) in raw {
            let min_version =
                version
                    .parse()
                    .map_err(|e| InstallError::MalformedRequirements {
                        file: dir.to_path_buf(),
                        reason: format!("requirement '{}': {}", name, e),
                    })?;
            parsed.push(Requirement::new(name, min_version));
        }
        Ok(requirement::dedup(parsed))
    }

    /// Install the package described by `desc`, returning its effective
    /// directory. The descriptor is updated in place with the directory,
    /// version, requirements, and commit of the checkout.
    #[tracing::instrument(skip(self, desc), fields(package = %desc.name))]
    pub async fn install(&self, desc: &mut PackageDescriptor) -> Result<PathBuf, InstallError> {
        let lock = self.name_lock(&desc.name);
        let _serialized = lock.lock().await;

        let target = self.target_dir(&desc.name);
        self.claim_target(&desc.name, &target)?;

        let upstream: Upstream = desc.upstream()?.clone();

        self.runtime.create_dir_all(&self.root)?;

        let backend = upstream.backend.clone().unwrap_or_default();
        info!("cloning {} into {}", upstream.location, target.display());
        let copy = self
            .bounded(self.vcs.clone_repo(&backend, &upstream.location, &target))
            .await
            .map_err(|e| InstallError::CloneFailed {
                location: upstream.location.clone(),
                reason: e.to_string(),
            })?;

        if let Some(rev) = desc.effective_revision().map(str::to_string) {
            self.bounded(self.vcs.checkout_revision(&copy, &rev))
                .await
                .map_err(|e| InstallError::CheckoutFailed {
                    rev,
                    reason: e.to_string(),
                })?;
        }

        // The checkout keeps the full repository; only the package's
        // effective directory moves into the subdir.
        let effective = match &upstream.subdir {
            Some(subdir) => target.join(subdir),
            None => target.clone(),
        };
        desc.dir = Some(effective.clone());

        desc.requirements = self.extract_requirements(&effective)?;

        if let Err(e) = self
            .transactions
            .install_transaction(&desc.requirements)
            .await
        {
            warn!("leaving checkout at {} for inspection", effective.display());
            return Err(InstallError::DependencyTransaction(e));
        }

        desc.version = Some(self.versions.version(self.runtime.as_ref(), &effective));
        let commit = self
            .versions
            .commit(self.runtime.as_ref(), self.vcs.as_ref(), &effective)
            .await;
        desc.extras.insert("commit".to_string(), commit);

        let main_file = self
            .versions
            .ordered_files(self.runtime.as_ref(), &effective)
            .ok()
            .and_then(|files| {
                files
                    .first()
                    .and_then(|f| f.file_name())
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
            });
        let descriptor_path = writer::descriptor_path(&effective, &desc.name);
        if let Err(e) = writer::write(
            self.runtime.as_ref(),
            desc,
            &descriptor_path,
            main_file.as_deref(),
        ) {
            warn!("leaving checkout at {} for inspection", effective.display());
            return Err(e);
        }

        // Re-read from disk so activation sees the canonical record.
        let activation_failed = |e: anyhow::Error| InstallError::Activation {
            name: desc.name.clone(),
            reason: e.to_string(),
        };
        let loaded = self
            .activator
            .load_descriptor(&effective)
            .map_err(activation_failed)?;
        let activated = self
            .activator
            .activate(&loaded, true, true)
            .await
            .map_err(activation_failed)?;

        if activated {
            if let Err(e) = self.activator.compile(&loaded) {
                warn!("compilation of {} failed: {}", loaded.name, e);
            }
            let activator = Arc::clone(&self.activator);
            let native_desc = loaded.clone();
            tokio::spawn(async move {
                if let Err(e) = activator.native_compile(&native_desc).await {
                    warn!("native compilation of {} failed: {}", native_desc.name, e);
                }
            });
            if let Err(e) = self.activator.reload_stale(&loaded) {
                warn!("reloading stale units of {} failed: {}", loaded.name, e);
            }
        }

        info!(
            "installed {} {} at {}",
            desc.name,
            desc.version.as_deref().unwrap_or("0"),
            effective.display()
        );
        Ok(effective)
    }
}
