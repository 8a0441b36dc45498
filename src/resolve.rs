//! Turning user input into a package descriptor.
//!
//! Input is either a repository URL or a registry package name. URLs
//! become descriptors directly; names go through the index, whose entry
//! must carry a repository spec string in the
//! `backend location [subdir [branch]]` grammar.

use std::str::FromStr;

use log::debug;
use url::Url;

use crate::error::InstallError;
use crate::package::descriptor::{PackageDescriptor, Upstream};
use crate::registry::RegistryIndex;
use crate::vcs::Backend;

/// URL schemes accepted as repository locations.
const KNOWN_SCHEMES: &[&str] = &["http", "https", "git", "ssh", "file"];

/// A parsed repository spec string.
///
/// Grammar: `backend location [subdir [branch]]`, tokens separated by
/// runs of whitespace.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoSpec {
    pub backend: Backend,
    pub location: String,
    pub subdir: Option<String>,
    pub branch: Option<String>,
}

impl FromStr for RepoSpec {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        if !(2..=4).contains(&tokens.len()) {
            return Err(InstallError::InvalidSpec(s.to_string()));
        }
        let backend = tokens[0]
            .parse()
            .map_err(|_| InstallError::InvalidSpec(s.to_string()))?;
        Ok(RepoSpec {
            backend,
            location: tokens[1].to_string(),
            subdir: tokens.get(2).map(|t| t.to_string()),
            branch: tokens.get(3).map(|t| t.to_string()),
        })
    }
}

impl From<RepoSpec> for Upstream {
    fn from(spec: RepoSpec) -> Self {
        Upstream {
            backend: Some(spec.backend),
            location: spec.location,
            subdir: spec.subdir,
            branch: spec.branch,
        }
    }
}

/// Resolves names and URLs against a registry index.
pub struct SpecResolver<'a> {
    index: &'a dyn RegistryIndex,
}

impl<'a> SpecResolver<'a> {
    pub fn new(index: &'a dyn RegistryIndex) -> Self {
        SpecResolver { index }
    }

    /// Produce a vc descriptor for `input`, which is either a repository
    /// URL or a registry package name. `name` overrides the derived
    /// package name; `rev` pins the checkout.
    #[tracing::instrument(skip(self))]
    pub fn resolve(
        &self,
        input: &str,
        name: Option<&str>,
        rev: Option<&str>,
    ) -> Result<PackageDescriptor, InstallError> {
        if let Some(url) = parse_repo_url(input) {
            let derived = name
                .map(str::to_string)
                .or_else(|| name_from_url(&url))
                .ok_or_else(|| InstallError::UnknownPackage(input.to_string()))?;
            debug!("resolved URL input to package '{}'", derived);
            return Ok(PackageDescriptor::vc(derived, Upstream::new(None, input))
                .with_rev(rev.map(str::to_string)));
        }

        let entry = self
            .index
            .lookup(input)
            .ok_or_else(|| InstallError::UnknownPackage(input.to_string()))?;
        let spec_str = entry
            .vc_spec()
            .ok_or_else(|| InstallError::NoVcHeader(input.to_string()))?;
        let spec: RepoSpec = spec_str.parse()?;

        let mut desc = PackageDescriptor::vc(
            name.unwrap_or(&entry.name).to_string(),
            Upstream::from(spec),
        )
        .with_summary(entry.summary.clone())
        .with_rev(rev.map(str::to_string));
        desc.vc_spec = Some(spec_str.to_string());
        Ok(desc)
    }
}

fn parse_repo_url(input: &str) -> Option<Url> {
    let url = Url::parse(input).ok()?;
    KNOWN_SCHEMES.contains(&url.scheme()).then_some(url)
}

/// Final path component of the URL, minus its extension.
fn name_from_url(url: &Url) -> Option<String> {
    let segment = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()?;
    let stem = match segment.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => segment,
    };
    Some(stem.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MockRegistryIndex, RegistryEntry, VC_HEADER};
    use mockall::predicate::eq;

    fn entry_with_spec(name: &str, spec: &str) -> RegistryEntry {
        let mut entry = RegistryEntry {
            name: name.into(),
            summary: "A thing.".into(),
            ..Default::default()
        };
        entry.extras.insert(VC_HEADER.into(), spec.into());
        entry
    }

    #[test]
    fn test_repo_spec_full_grammar() {
        let spec: RepoSpec = "git https://example.com/pkg.git sub branchname"
            .parse()
            .unwrap();
        assert_eq!(spec.backend, Backend::Git);
        assert_eq!(spec.location, "https://example.com/pkg.git");
        assert_eq!(spec.subdir.as_deref(), Some("sub"));
        assert_eq!(spec.branch.as_deref(), Some("branchname"));
    }

    #[test]
    fn test_repo_spec_minimal() {
        let spec: RepoSpec = "git  https://example.com/pkg.git".parse().unwrap();
        assert_eq!(spec.subdir, None);
        assert_eq!(spec.branch, None);
    }

    #[test]
    fn test_repo_spec_malformed() {
        for bad in ["", "git", "git a b c d"] {
            let err = bad.parse::<RepoSpec>().unwrap_err();
            assert!(matches!(err, InstallError::InvalidSpec(_)), "case: {bad:?}");
        }
    }

    #[test]
    fn test_resolve_url_derives_name() {
        let index = MockRegistryIndex::new();
        let resolver = SpecResolver::new(&index);
        let desc = resolver
            .resolve("https://example.com/pkg.git", None, None)
            .unwrap();
        assert_eq!(desc.name, "pkg");
        let upstream = desc.upstream.as_ref().unwrap();
        assert_eq!(upstream.backend, None);
        assert_eq!(upstream.location, "https://example.com/pkg.git");
        assert_eq!(upstream.subdir, None);
        assert_eq!(upstream.branch, None);
        assert!(desc.dir.is_none());
    }

    #[test]
    fn test_resolve_url_explicit_name_and_rev() {
        let index = MockRegistryIndex::new();
        let resolver = SpecResolver::new(&index);
        let desc = resolver
            .resolve(
                "https://example.com/pkg.git",
                Some("other"),
                Some("deadbeef"),
            )
            .unwrap();
        assert_eq!(desc.name, "other");
        assert_eq!(desc.rev.as_deref(), Some("deadbeef"));
    }

    #[test]
    fn test_resolve_url_without_extension() {
        let index = MockRegistryIndex::new();
        let resolver = SpecResolver::new(&index);
        let desc = resolver
            .resolve("https://example.com/group/pkg", None, None)
            .unwrap();
        assert_eq!(desc.name, "pkg");
    }

    #[test]
    fn test_resolve_registry_name() {
        let mut index = MockRegistryIndex::new();
        index
            .expect_lookup()
            .with(eq("foo"))
            .returning(|_| Some(entry_with_spec("foo", "git https://example.com/foo.git")));
        let resolver = SpecResolver::new(&index);

        let desc = resolver.resolve("foo", None, None).unwrap();
        assert_eq!(desc.name, "foo");
        assert_eq!(desc.summary, "A thing.");
        assert_eq!(
            desc.vc_spec.as_deref(),
            Some("git https://example.com/foo.git")
        );
        let upstream = desc.upstream.as_ref().unwrap();
        assert_eq!(upstream.backend, Some(Backend::Git));
        assert_eq!(upstream.location, "https://example.com/foo.git");
    }

    #[test]
    fn test_resolve_unknown_package() {
        let mut index = MockRegistryIndex::new();
        index.expect_lookup().returning(|_| None);
        let resolver = SpecResolver::new(&index);
        let err = resolver.resolve("nope", None, None).unwrap_err();
        assert!(matches!(err, InstallError::UnknownPackage(name) if name == "nope"));
    }

    #[test]
    fn test_resolve_entry_without_vc_header() {
        let mut index = MockRegistryIndex::new();
        index.expect_lookup().returning(|_| {
            Some(RegistryEntry {
                name: "foo".into(),
                ..Default::default()
            })
        });
        let resolver = SpecResolver::new(&index);
        let err = resolver.resolve("foo", None, None).unwrap_err();
        assert!(matches!(err, InstallError::NoVcHeader(_)));
    }

    #[test]
    fn test_resolve_entry_with_malformed_spec() {
        let mut index = MockRegistryIndex::new();
        index
            .expect_lookup()
            .returning(|_| Some(entry_with_spec("foo", "git")));
        let resolver = SpecResolver::new(&index);
        let err = resolver.resolve("foo", None, None).unwrap_err();
        assert!(matches!(err, InstallError::InvalidSpec(_)));
    }

    #[test]
    fn test_unrecognized_scheme_falls_through_to_registry() {
        let mut index = MockRegistryIndex::new();
        index.expect_lookup().returning(|_| None);
        let resolver = SpecResolver::new(&index);
        // "mailto:" parses as a URL but is not a repository scheme
        let err = resolver.resolve("mailto:x@example.com", None, None).unwrap_err();
        assert!(matches!(err, InstallError::UnknownPackage(_)));
    }
}
