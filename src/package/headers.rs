//! Source-file header conventions.
//!
//! Package metadata lives in `Key: value` headers inside the leading
//! comment block of a source file, with continuation lines indented under
//! their key. Comment markers `;;`, `#`, and `//` are all accepted so the
//! convention works across source languages.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::package::writer::DESCRIPTOR_SUFFIX;
use crate::runtime::Runtime;

/// Strip the comment marker from a line, or `None` if it is not a comment.
///
/// One space after the marker belongs to the marker, so `;; Key: value`
/// yields `Key: value` while the extra indent of a continuation line
/// survives.
fn comment_body(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    for marker in [";;", "#", "//"] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            // `;;;` section markers reduce to the same body.
            let rest = rest.trim_start_matches(';');
            return Some(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    None
}

/// Read a header value from the leading comment block of `contents`.
///
/// Continuation lines (comment lines starting with whitespace after the
/// marker, before the next `Key:` line) are joined with a single space.
/// The first non-blank, non-comment line ends the block.
pub fn header_value(contents: &str, name: &str) -> Option<String> {
    let mut value: Option<String> = None;
    for line in contents.lines() {
        if line.trim().is_empty() {
            if value.is_some() {
                break;
            }
            continue;
        }
        let Some(body) = comment_body(line) else {
            break; // end of the leading comment block
        };
        match &mut value {
            Some(acc) => {
                // A continuation keeps collecting; anything else ends the header.
                if body.starts_with(char::is_whitespace) && !body.trim().is_empty() {
                    acc.push(' ');
                    acc.push_str(body.trim());
                } else {
                    break;
                }
            }
            None => {
                if let Some((key, rest)) = body.trim_start().split_once(':')
                    && key.trim().eq_ignore_ascii_case(name)
                {
                    value = Some(rest.trim().to_string());
                }
            }
        }
    }
    value.filter(|v| !v.is_empty())
}

/// Strip revision-control keyword expansion from a header value.
///
/// `$Revision: 1.5 $` becomes `1.5`; an unexpanded `$Revision$` becomes
/// the empty string; anything else passes through untouched.
pub fn strip_rcs_keywords(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(inner) = trimmed.strip_prefix('$').and_then(|s| s.strip_suffix('$')) {
        match inner.split_once(':') {
            Some((_, expansion)) => expansion.trim().to_string(),
            None => String::new(),
        }
    } else {
        trimmed.to_string()
    }
}

/// The regular source files directly inside `dir`, unordered.
///
/// Hidden files and generated descriptor files are not source files.
pub fn source_files<R: Runtime + ?Sized>(runtime: &R, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in runtime.read_dir(dir)? {
        if runtime.is_dir(&path) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') || name.ends_with(DESCRIPTOR_SUFFIX) {
            continue;
        }
        files.push(path);
    }
    Ok(files)
}
