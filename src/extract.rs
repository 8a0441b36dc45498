//! Dependency extraction from source-file headers.
//!
//! Each source file directly inside a package directory may declare a
//! `Package-Requires` header whose value is a list of
//! `(name "min-version")` pairs, continuation lines allowed. The scan is
//! non-recursive and returns raw pairs in file order; deduplication and
//! version parsing are the installer's job.

use std::path::Path;

use log::{debug, warn};

use crate::error::InstallError;
use crate::package::headers::{header_value, source_files};
use crate::runtime::Runtime;
use crate::sexp::{self, Sexp};

/// Header declaring package requirements.
pub const REQUIRES_HEADER: &str = "Package-Requires";

/// A dependency as written in a header, before version parsing.
pub type RawRequirement = (String, String);

/// Collect every `Package-Requires` declaration under `dir`.
///
/// Files without the header contribute nothing; a header that is present
/// but unparsable aborts the scan with `MalformedRequirements`.
#[tracing::instrument(skip(runtime))]
pub fn requirements<R: Runtime + ?Sized>(
    runtime: &R,
    dir: &Path,
) -> Result<Vec<RawRequirement>, InstallError> {
    let mut files = source_files(runtime, dir).map_err(InstallError::Other)?;
    files.sort();

    let mut found = Vec::new();
    for file in files {
        let contents = match runtime.read_to_string(&file) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("skipping unreadable {}: {}", file.display(), e);
                continue;
            }
        };
        let Some(value) = header_value(&contents, REQUIRES_HEADER) else {
            continue;
        };
        let pairs = parse_requires(&value).map_err(|reason| {
            InstallError::MalformedRequirements {
                file: file.clone(),
                reason,
            }
        })?;
        debug!("{} declares {} requirement(s)", file.display(), pairs.len());
        found.extend(pairs);
    }
    Ok(found)
}

/// Parse a `Package-Requires` value: `((name "version") ...)`.
///
/// A bare `(name)` pair means "any version" and yields `"0"`.
fn parse_requires(value: &str) -> Result<Vec<RawRequirement>, String> {
    let parsed = sexp::parse(value).map_err(|e| e.to_string())?;
    let items = parsed
        .as_list()
        .ok_or_else(|| "requirements must be a list".to_string())?;

    let mut pairs = Vec::with_capacity(items.len());
    for item in items {
        let pair = match item {
            // A bare name is tolerated alongside (name "version") pairs.
            Sexp::Symbol(name) => return_pair(name, None)?,
            Sexp::List(elements) => {
                if elements.is_empty() || elements.len() > 2 {
                    return Err(format!("malformed requirement '{}'", item));
                }
                let name = elements[0]
                    .as_name()
                    .ok_or_else(|| format!("requirement name missing in '{}'", item))?;
                let version = match elements.get(1) {
                    Some(v) => Some(
                        v.as_str()
                            .ok_or_else(|| format!("version must be a string in '{}'", item))?,
                    ),
                    None => None,
                };
                return_pair(name, version)?
            }
            other => return Err(format!("malformed requirement '{}'", other)),
        };
        pairs.push(pair);
    }
    Ok(pairs)
}

fn return_pair(name: &str, version: Option<&str>) -> Result<RawRequirement, String> {
    if name.is_empty() {
        return Err("empty requirement name".to_string());
    }
    Ok((name.to_string(), version.unwrap_or("0").to_string()))
}
