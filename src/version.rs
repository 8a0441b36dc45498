//! Version and commit derivation for a checked-out source tree.
//!
//! Checkouts rarely declare a version anywhere authoritative, so both
//! answers here are documented heuristics with explicit fallbacks: `"0"`
//! when no file carries a version header, `"unknown"` when the backend
//! cannot name a commit.

use std::path::{Path, PathBuf};

use log::debug;

use crate::package::headers::{header_value, source_files, strip_rcs_keywords};
use crate::runtime::Runtime;
use crate::vcs::Vcs;

/// Header checked first for a version; specific to the package format.
pub const PACKAGE_VERSION_HEADER: &str = "Package-Version";
/// Generic fallback version header.
pub const VERSION_HEADER: &str = "Version";

/// Scan order over source files.
///
/// The default favors shorter filenames: a package's "main" file usually
/// has the shortest name and is the most likely to carry the
/// authoritative version header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileOrder {
    #[default]
    ShortestNameFirst,
    Lexicographic,
}

impl FileOrder {
    pub fn sort(&self, files: &mut [PathBuf]) {
        let key = |p: &PathBuf| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .unwrap_or_default()
        };
        match self {
            FileOrder::ShortestNameFirst => {
                files.sort_by_key(|p| {
                    let name = key(p);
                    (name.len(), name)
                });
            }
            FileOrder::Lexicographic => files.sort_by_key(key),
        }
    }
}

/// Derives version strings and commit ids for a source tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionResolver {
    pub order: FileOrder,
}

impl VersionResolver {
    pub fn new(order: FileOrder) -> Self {
        VersionResolver { order }
    }

    /// The files `version` will consult, in the order it consults them.
    pub fn ordered_files<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        dir: &Path,
    ) -> anyhow::Result<Vec<PathBuf>> {
        let mut files = source_files(runtime, dir)?;
        self.order.sort(&mut files);
        Ok(files)
    }

    /// The version declared by the checkout, or `"0"`.
    ///
    /// The first file (per the ordering policy) with a non-empty
    /// `Package-Version` or `Version` header wins; keyword-expansion
    /// artifacts are stripped from the value.
    #[tracing::instrument(skip(self, runtime))]
    pub fn version<R: Runtime + ?Sized>(&self, runtime: &R, dir: &Path) -> String {
        let files = match self.ordered_files(runtime, dir) {
            Ok(files) => files,
            Err(e) => {
                debug!("version scan of {} failed: {}", dir.display(), e);
                return "0".to_string();
            }
        };
        for file in files {
            let Ok(contents) = runtime.read_to_string(&file) else {
                continue;
            };
            let raw = header_value(&contents, PACKAGE_VERSION_HEADER)
                .or_else(|| header_value(&contents, VERSION_HEADER));
            if let Some(raw) = raw {
                let version = strip_rcs_keywords(&raw);
                if !version.is_empty() {
                    debug!("version {} from {}", version, file.display());
                    return version;
                }
            }
        }
        "0".to_string()
    }

    /// The commit the checkout is at, or `"unknown"`.
    ///
    /// Asks the backend per file and takes the first non-blank answer; a
    /// stand-in for a per-directory query, so the result is best-effort.
    #[tracing::instrument(skip(self, runtime, vcs))]
    pub async fn commit<R: Runtime + ?Sized, V: Vcs + ?Sized>(
        &self,
        runtime: &R,
        vcs: &V,
        dir: &Path,
    ) -> String {
        let files = match self.ordered_files(runtime, dir) {
            Ok(files) => files,
            Err(_) => return "unknown".to_string(),
        };
        for file in files {
            if let Some(commit) = vcs.working_revision(&file).await
                && !commit.trim().is_empty()
            {
                return commit.trim().to_string();
            }
        }
        "unknown".to_string()
    }
}
