//! Descriptor file generation.
//!
//! The descriptor is a single `(vc-package ...)` record the registry loader
//! parses back verbatim: name, `(vc . version)` tuple, summary, dependency
//! list, then keyword fields. Field order is part of the format.

use std::path::{Path, PathBuf};

use log::debug;

use crate::error::InstallError;
use crate::package::descriptor::{PackageDescriptor, Upstream};
use crate::runtime::Runtime;
use crate::sexp::Sexp;

/// Suffix of generated descriptor files: `<name>-pkg.eld`.
pub const DESCRIPTOR_SUFFIX: &str = "-pkg.eld";

/// Head symbol of the descriptor record.
pub const RECORD_HEAD: &str = "vc-package";

pub fn descriptor_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}{}", name, DESCRIPTOR_SUFFIX))
}

fn upstream_sexp(upstream: &Upstream) -> Sexp {
    let opt = |value: &Option<String>| match value {
        Some(s) => Sexp::string(s.clone()),
        None => Sexp::nil(),
    };
    Sexp::List(vec![
        match &upstream.backend {
            Some(backend) => Sexp::symbol(backend.to_string()),
            None => Sexp::nil(),
        },
        Sexp::string(upstream.location.clone()),
        opt(&upstream.subdir),
        opt(&upstream.branch),
    ])
}

/// Render the descriptor record, preceded by a header comment naming the
/// package's primary source file.
pub fn render(desc: &PackageDescriptor, main_file: Option<&str>) -> String {
    let version = desc.version.as_deref().unwrap_or("0");

    let deps = Sexp::List(
        desc.requirements
            .iter()
            .map(|req| {
                Sexp::List(vec![
                    Sexp::symbol(req.name.clone()),
                    Sexp::string(req.min_version.to_string()),
                ])
            })
            .collect(),
    );

    let mut fields = vec![
        Sexp::symbol(RECORD_HEAD),
        Sexp::string(desc.name.clone()),
        Sexp::Cons(
            Box::new(Sexp::symbol("vc")),
            Box::new(Sexp::string(version)),
        ),
        Sexp::string(desc.summary.clone()),
        deps,
        Sexp::symbol(":kind"),
        Sexp::symbol(desc.kind.to_string()),
    ];
    if let Some(upstream) = &desc.upstream {
        fields.push(Sexp::symbol(":upstream"));
        fields.push(upstream_sexp(upstream));
    }
    if let Some(rev) = &desc.rev {
        fields.push(Sexp::symbol(":rev"));
        fields.push(Sexp::string(rev.clone()));
    }
    for (key, value) in &desc.extras {
        fields.push(Sexp::symbol(format!(":{}", key)));
        fields.push(Sexp::string(value.clone()));
    }

    let origin = match main_file {
        Some(file) => format!("generated from {}", file),
        None => "generated package descriptor".to_string(),
    };
    format!(
        ";;; {}{} --- {}\n;; Do not edit; regenerated on every install.\n{}\n",
        desc.name,
        DESCRIPTOR_SUFFIX,
        origin,
        Sexp::List(fields)
    )
}

/// Write the descriptor to `path` atomically: the record lands in a
/// sibling temp file first and is renamed into place on success.
pub fn write<R: Runtime + ?Sized>(
    runtime: &R,
    desc: &PackageDescriptor,
    path: &Path,
    main_file: Option<&str>,
) -> Result<(), InstallError> {
    let contents = render(desc, main_file);
    let tmp = path.with_extension("eld.tmp");
    let failed = |e: anyhow::Error| InstallError::DescriptorWrite {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    runtime.write(&tmp, contents.as_bytes()).map_err(failed)?;
    runtime.rename(&tmp, path).map_err(failed)?;
    debug!("wrote descriptor {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::descriptor::Upstream;
    use crate::package::requirement::Requirement;
    use crate::runtime::MockRuntime;
    use crate::sexp;
    use crate::vcs::Backend;
    use mockall::predicate::eq;

    fn sample() -> PackageDescriptor {
        let mut upstream = Upstream::new(Some(Backend::Git), "https://example.com/foo.git");
        upstream.branch = Some("main".into());
        let mut desc = PackageDescriptor::vc("foo", upstream).with_summary("A thing.");
        desc.version = Some("1.2".into());
        desc.requirements = vec![
            Requirement::new("bar", "0.3".parse().unwrap()),
            Requirement::new("baz", "1.0".parse().unwrap()),
        ];
        desc.extras.insert("commit".into(), "abc123".into());
        desc
    }

    #[test]
    fn test_render_shape() {
        let out = render(&sample(), Some("foo.src"));
        assert!(out.starts_with(";;; foo-pkg.eld --- generated from foo.src\n"));
        assert!(out.contains("(vc-package \"foo\" (vc . \"1.2\") \"A thing.\" ((bar \"0.3\") (baz \"1.0\"))"));
        assert!(out.contains(":kind vc"));
        assert!(out.contains(":upstream (git \"https://example.com/foo.git\" nil \"main\")"));
        assert!(out.contains(":commit \"abc123\""));
    }

    #[test]
    fn test_render_is_parseable() {
        let out = render(&sample(), None);
        let record = sexp::parse(&out).unwrap();
        let items = record.as_list().unwrap();
        assert_eq!(items[0].as_symbol(), Some(RECORD_HEAD));
        assert_eq!(items[1].as_str(), Some("foo"));
        assert_eq!(items[3].as_str(), Some("A thing."));
    }

    #[test]
    fn test_render_defaults_version_to_zero() {
        let mut desc = sample();
        desc.version = None;
        assert!(render(&desc, None).contains("(vc . \"0\")"));
    }

    #[test]
    fn test_write_is_temp_then_rename() {
        let desc = sample();
        let dir = Path::new("/pkgs/foo-vc");
        let path = descriptor_path(dir, "foo");
        let tmp = path.with_extension("eld.tmp");

        let mut runtime = MockRuntime::new();
        runtime
            .expect_write()
            .withf(move |p, contents| {
                p == tmp && std::str::from_utf8(contents).unwrap().contains("vc-package")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        runtime
            .expect_rename()
            .with(
                eq(path.with_extension("eld.tmp")),
                eq(path.clone()),
            )
            .times(1)
            .returning(|_, _| Ok(()));

        write(&runtime, &desc, &path, None).unwrap();
    }

    #[test]
    fn test_write_failure_is_descriptor_write() {
        let desc = sample();
        let path = descriptor_path(Path::new("/pkgs/foo-vc"), "foo");

        let mut runtime = MockRuntime::new();
        runtime
            .expect_write()
            .returning(|_, _| Err(anyhow::anyhow!("disk full")));

        let err = write(&runtime, &desc, &path, None).unwrap_err();
        assert!(matches!(err, InstallError::DescriptorWrite { .. }));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_descriptor_path() {
        assert_eq!(
            descriptor_path(Path::new("/p"), "foo"),
            PathBuf::from("/p/foo-pkg.eld")
        );
    }
}
