//! Local implementations of the registry collaborators.
//!
//! `LocalIndex` reads the package index from a JSON file; `LocalActivator`
//! is the registry loader side: it parses generated descriptor files back
//! and tracks which packages are active in this process.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{Activator, RegistryEntry, RegistryIndex, TransactionInstaller};
use crate::package::descriptor::{PackageDescriptor, PackageKind, Upstream};
use crate::package::requirement::Requirement;
use crate::package::writer::{DESCRIPTOR_SUFFIX, RECORD_HEAD};
use crate::runtime::Runtime;
use crate::sexp::{self, Sexp};

/// Package index backed by a JSON file mapping name to entry.
#[derive(Debug, Default)]
pub struct LocalIndex {
    entries: BTreeMap<String, RegistryEntry>,
}

impl LocalIndex {
    pub fn from_entries(entries: impl IntoIterator<Item = RegistryEntry>) -> Self {
        LocalIndex {
            entries: entries
                .into_iter()
                .map(|entry| (entry.name.clone(), entry))
                .collect(),
        }
    }

    /// Load the index file; a missing file is an empty index.
    pub fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            debug!("no index at {}, starting empty", path.display());
            return Ok(LocalIndex::default());
        }
        let contents = runtime.read_to_string(path)?;
        let mut entries: BTreeMap<String, RegistryEntry> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse index {}", path.display()))?;
        for (name, entry) in entries.iter_mut() {
            entry.name = name.clone();
        }
        Ok(LocalIndex { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RegistryIndex for LocalIndex {
    fn lookup(&self, name: &str) -> Option<RegistryEntry> {
        self.entries.get(name).cloned()
    }
}

/// Transaction installer that accepts every requirement set.
///
/// Stands in for a real archive-backed resolver; it only reports what it
/// was asked for.
pub struct NullTransactionInstaller;

#[async_trait]
impl TransactionInstaller for NullTransactionInstaller {
    async fn install_transaction(&self, requirements: &[Requirement]) -> Result<()> {
        for req in requirements {
            info!("dependency {} >= {}", req.name, req.min_version);
        }
        Ok(())
    }
}

/// Registry loader and in-process activation tracking.
pub struct LocalActivator<R: Runtime> {
    runtime: Arc<R>,
    active: Mutex<BTreeMap<String, PathBuf>>,
}

impl<R: Runtime> LocalActivator<R> {
    pub fn new(runtime: Arc<R>) -> Self {
        LocalActivator {
            runtime,
            active: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active.lock().expect("activator lock").contains_key(name)
    }

    fn descriptor_file(&self, dir: &Path) -> Result<PathBuf> {
        let mut candidates: Vec<PathBuf> = self
            .runtime
            .read_dir(dir)?
            .into_iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(DESCRIPTOR_SUFFIX))
            })
            .collect();
        candidates.sort();
        candidates
            .into_iter()
            .next()
            .with_context(|| format!("no descriptor file in {}", dir.display()))
    }
}

#[async_trait]
impl<R: Runtime + 'static> Activator for LocalActivator<R> {
    fn load_descriptor(&self, dir: &Path) -> Result<PackageDescriptor> {
        let file = self.descriptor_file(dir)?;
        let contents = self.runtime.read_to_string(&file)?;
        let mut desc = parse_descriptor(&contents)
            .with_context(|| format!("Failed to parse descriptor {}", file.display()))?;
        desc.dir = Some(dir.to_path_buf());
        Ok(desc)
    }

    async fn activate(&self, desc: &PackageDescriptor, reload: bool, deps: bool) -> Result<bool> {
        let dir = desc
            .dir
            .clone()
            .with_context(|| format!("descriptor for '{}' has no directory", desc.name))?;
        let mut active = self.active.lock().expect("activator lock");
        if active.contains_key(&desc.name) && !reload {
            return Ok(false);
        }
        if deps {
            for req in &desc.requirements {
                debug!("assuming dependency {} is active", req.name);
            }
        }
        active.insert(desc.name.clone(), dir);
        info!("activated {}", desc.name);
        Ok(true)
    }

    fn compile(&self, desc: &PackageDescriptor) -> Result<()> {
        debug!("compile pass for {}", desc.name);
        Ok(())
    }

    async fn native_compile(&self, desc: &PackageDescriptor) -> Result<()> {
        debug!("native compile pass for {}", desc.name);
        Ok(())
    }

    fn reload_stale(&self, desc: &PackageDescriptor) -> Result<()> {
        debug!("reloading stale units of {}", desc.name);
        Ok(())
    }
}

fn opt_string(value: &Sexp) -> Result<Option<String>> {
    if value.is_nil() {
        return Ok(None);
    }
    value
        .as_str()
        .map(|s| Some(s.to_string()))
        .context("expected string or nil")
}

fn parse_upstream(value: &Sexp) -> Result<Upstream> {
    let items = value.as_list().context(":upstream must be a list")?;
    if items.len() != 4 {
        bail!(":upstream must have four elements");
    }
    let backend = if items[0].is_nil() {
        None
    } else {
        Some(
            items[0]
                .as_symbol()
                .context("backend must be a symbol")?
                .parse()?,
        )
    };
    Ok(Upstream {
        backend,
        location: items[1]
            .as_str()
            .context("upstream location must be a string")?
            .to_string(),
        subdir: opt_string(&items[2])?,
        branch: opt_string(&items[3])?,
    })
}

/// Parse a generated descriptor record. Rejects anything that does not
/// match the written shape exactly.
pub fn parse_descriptor(contents: &str) -> Result<PackageDescriptor> {
    let record = sexp::parse(contents)?;
    let items = record.as_list().context("descriptor must be a list")?;
    if items.len() < 5 || items[0].as_symbol() != Some(RECORD_HEAD) {
        bail!("not a {} record", RECORD_HEAD);
    }
    let name = items[1].as_name().context("package name missing")?;
    let Sexp::Cons(tag, version) = &items[2] else {
        bail!("expected (vc . VERSION) tuple");
    };
    if tag.as_symbol() != Some("vc") {
        bail!("version tuple is not vc-tagged");
    }
    let version = version.as_str().context("version must be a string")?;
    let summary = items[3].as_str().context("summary must be a string")?;

    let mut requirements = Vec::new();
    for dep in items[4].as_list().context("dependency list missing")? {
        let pair = dep.as_list().context("dependency must be a pair")?;
        let dep_name = pair
            .first()
            .and_then(Sexp::as_name)
            .context("dependency name missing")?;
        let min = match pair.get(1) {
            Some(v) => v.as_str().context("dependency version must be a string")?,
            None => "0",
        };
        requirements.push(Requirement::new(dep_name, min.parse()?));
    }

    let mut desc = PackageDescriptor {
        name: name.to_string(),
        kind: PackageKind::Vc,
        dir: None,
        summary: summary.to_string(),
        requirements,
        version: Some(version.to_string()),
        upstream: None,
        rev: None,
        vc_spec: None,
        extras: BTreeMap::new(),
    };

    let mut rest = items[5..].iter();
    while let Some(key) = rest.next() {
        let key = key
            .as_symbol()
            .and_then(|s| s.strip_prefix(':'))
            .context("expected keyword field")?;
        let value = rest.next().context("keyword field without value")?;
        match key {
            "kind" => {
                desc.kind = value
                    .as_symbol()
                    .context(":kind must be a symbol")?
                    .parse()?;
            }
            "upstream" => desc.upstream = Some(parse_upstream(value)?),
            "rev" => desc.rev = opt_string(value)?,
            other => {
                let rendered = match value {
                    Sexp::Str(s) => s.clone(),
                    v => v.to_string(),
                };
                desc.extras.insert(other.to_string(), rendered);
            }
        }
    }

    if desc.kind == PackageKind::Vc && desc.upstream.is_none() {
        bail!("vc package '{}' has no :upstream field", desc.name);
    }
    Ok(desc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::writer;
    use crate::runtime::MockRuntime;
    use crate::vcs::Backend;

    fn sample() -> PackageDescriptor {
        let mut upstream = Upstream::new(Some(Backend::Git), "https://example.com/foo.git");
        upstream.subdir = Some("sub".into());
        let mut desc = PackageDescriptor::vc("foo", upstream).with_summary("A thing.");
        desc.version = Some("1.2".into());
        desc.requirements = vec![Requirement::new("bar", "0.3".parse().unwrap())];
        desc.extras.insert("commit".into(), "abc123".into());
        desc
    }

    #[test]
    fn test_descriptor_round_trip() {
        let original = sample();
        let rendered = writer::render(&original, Some("foo.src"));
        let parsed = parse_descriptor(&rendered).unwrap();

        assert_eq!(parsed.name, original.name);
        assert_eq!(parsed.kind, PackageKind::Vc);
        assert_eq!(parsed.version.as_deref(), Some("1.2"));
        assert_eq!(parsed.summary, original.summary);
        assert_eq!(parsed.requirements, original.requirements);
        assert_eq!(parsed.upstream, original.upstream);
        assert_eq!(parsed.extras.get("commit").unwrap(), "abc123");
    }

    #[test]
    fn test_parse_descriptor_rejects_foreign_records() {
        assert!(parse_descriptor("(define-package \"foo\")").is_err());
        assert!(parse_descriptor("(vc-package \"foo\")").is_err());
        assert!(parse_descriptor("garbage").is_err());
    }

    #[test]
    fn test_parse_descriptor_requires_upstream_for_vc() {
        let err = parse_descriptor("(vc-package \"foo\" (vc . \"1\") \"s\" () :kind vc)")
            .unwrap_err();
        assert!(err.to_string().contains("no :upstream"));
    }

    #[test]
    fn test_parse_descriptor_nil_backend() {
        let parsed = parse_descriptor(
            "(vc-package \"foo\" (vc . \"1\") \"s\" () :kind vc :upstream (nil \"u\" nil nil))",
        )
        .unwrap();
        let upstream = parsed.upstream.unwrap();
        assert_eq!(upstream.backend, None);
        assert_eq!(upstream.location, "u");
    }

    #[test]
    fn test_local_index_lookup() {
        let index = LocalIndex::from_entries([RegistryEntry {
            name: "foo".into(),
            summary: "A thing.".into(),
            ..Default::default()
        }]);
        assert_eq!(index.lookup("foo").unwrap().summary, "A thing.");
        assert!(index.lookup("missing").is_none());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_local_index_load_missing_is_empty() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().return_const(false);
        let index = LocalIndex::load(&runtime, Path::new("/idx.json")).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_local_index_load_fills_names_from_keys() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().return_const(true);
        runtime.expect_read_to_string().returning(|_| {
            Ok(r#"{"foo": {"summary": "A thing.", "extras": {"vc": "git u"}}}"#.into())
        });
        let index = LocalIndex::load(&runtime, Path::new("/idx.json")).unwrap();
        let entry = index.lookup("foo").unwrap();
        assert_eq!(entry.name, "foo");
        assert_eq!(entry.vc_spec(), Some("git u"));
    }

    #[tokio::test]
    async fn test_activate_tracks_and_respects_reload_flag() {
        let activator = LocalActivator::new(Arc::new(MockRuntime::new()));
        let mut desc = sample();
        desc.dir = Some(PathBuf::from("/pkgs/foo-vc"));

        assert!(activator.activate(&desc, false, true).await.unwrap());
        assert!(activator.is_active("foo"));
        // Second activation without reload is a no-op
        assert!(!activator.activate(&desc, false, true).await.unwrap());
        assert!(activator.activate(&desc, true, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_activate_requires_directory() {
        let activator = LocalActivator::new(Arc::new(MockRuntime::new()));
        let desc = sample(); // dir unset
        assert!(activator.activate(&desc, true, true).await.is_err());
    }

    #[test]
    fn test_load_descriptor_reads_the_generated_file() {
        let desc = sample();
        let rendered = writer::render(&desc, None);

        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_dir()
            .returning(|dir| Ok(vec![dir.join("notes.txt"), dir.join("foo-pkg.eld")]));
        runtime
            .expect_read_to_string()
            .returning(move |_| Ok(rendered.clone()));

        let activator = LocalActivator::new(Arc::new(runtime));
        let loaded = activator.load_descriptor(Path::new("/pkgs/foo-vc")).unwrap();
        assert_eq!(loaded.name, "foo");
        assert_eq!(loaded.dir.as_deref(), Some(Path::new("/pkgs/foo-vc")));
    }

    #[test]
    fn test_load_descriptor_without_file_fails() {
        let mut runtime = MockRuntime::new();
        runtime.expect_read_dir().returning(|_| Ok(vec![]));
        let activator = LocalActivator::new(Arc::new(runtime));
        assert!(activator.load_descriptor(Path::new("/pkgs/foo-vc")).is_err());
    }
}
