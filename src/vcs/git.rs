//! Git backend, driving the `git` binary.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::{debug, warn};
use std::path::Path;
use tokio::process::Command;

use super::{Backend, Vcs, WorkingCopy};

pub struct GitVcs;

impl GitVcs {
    async fn run_git(args: &[&str], cwd: Option<&Path>) -> Result<String> {
        let mut cmd = Command::new("git");
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        debug!("running git {:?}", args);
        let output = cmd.output().await.context("Failed to spawn git")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git {} exited with {}: {}", args.join(" "), output.status, stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Vcs for GitVcs {
    #[tracing::instrument(skip(self))]
    async fn clone_repo(
        &self,
        backend: &Backend,
        location: &str,
        dest: &Path,
    ) -> Result<WorkingCopy> {
        if !matches!(backend, Backend::Git) {
            bail!("no driver for backend '{}'", backend);
        }
        let dest_str = dest
            .to_str()
            .context("Destination path is not valid UTF-8")?;
        Self::run_git(&["clone", "--", location, dest_str], None).await?;
        if !dest.join(".git").exists() {
            bail!("clone of {} produced no working copy at {}", location, dest.display());
        }
        Ok(WorkingCopy {
            root: dest.to_path_buf(),
        })
    }

    #[tracing::instrument(skip(self, copy))]
    async fn checkout_revision(&self, copy: &WorkingCopy, rev: &str) -> Result<()> {
        Self::run_git(&["checkout", rev], Some(&copy.root)).await?;
        Ok(())
    }

    async fn working_revision(&self, file: &Path) -> Option<String> {
        let parent = file.parent()?;
        let name = file.file_name()?.to_str()?;
        match Self::run_git(&["log", "-n", "1", "--pretty=format:%H", "--", name], Some(parent))
            .await
        {
            Ok(out) => {
                let commit = out.trim().to_string();
                if commit.is_empty() { None } else { Some(commit) }
            }
            Err(e) => {
                warn!("working revision query for {} failed: {}", file.display(), e);
                None
            }
        }
    }
}
