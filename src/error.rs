//! Error types for the install pipeline.
//!
//! Every failure that aborts an install has its own variant so callers can
//! match on the kind; collaborator errors are carried verbatim inside.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallError {
    /// The input was neither a URL nor a name known to the registry index.
    #[error("package '{0}' is not known to the registry")]
    UnknownPackage(String),

    /// The registry entry exists but declares no repository spec.
    #[error("registry entry for '{0}' has no vc header")]
    NoVcHeader(String),

    /// The repository spec string does not match `backend location [subdir [branch]]`.
    #[error("invalid repository spec '{0}' (expected 'backend location [subdir [branch]]')")]
    InvalidSpec(String),

    /// The descriptor carries no upstream tuple.
    #[error("package '{0}' declares no upstream repository")]
    NoRepository(String),

    /// The target directory exists and the overwrite prompt was declined.
    #[error("'{name}' is already installed at {}", dir.display())]
    AlreadyInstalled { name: String, dir: PathBuf },

    #[error("cloning {location} failed: {reason}")]
    CloneFailed { location: String, reason: String },

    #[error("checking out '{rev}' failed: {reason}")]
    CheckoutFailed { rev: String, reason: String },

    /// A dependency header was present but could not be parsed.
    #[error("malformed dependency header in {}: {reason}", file.display())]
    MalformedRequirements { file: PathBuf, reason: String },

    /// The external transaction installer refused or failed the requirement set.
    #[error("dependency transaction failed: {0}")]
    DependencyTransaction(anyhow::Error),

    #[error("writing descriptor {} failed: {reason}", path.display())]
    DescriptorWrite { path: PathBuf, reason: String },

    /// Reloading the written descriptor or activating the package failed.
    #[error("activating '{name}' failed: {reason}")]
    Activation { name: String, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T, E = InstallError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = InstallError::UnknownPackage("foo".into());
        assert!(err.to_string().contains("foo"));

        let err = InstallError::AlreadyInstalled {
            name: "foo".into(),
            dir: PathBuf::from("/tmp/foo-vc"),
        };
        assert!(err.to_string().contains("foo-vc"));

        let err = InstallError::InvalidSpec("git".into());
        assert!(err.to_string().contains("backend location"));
    }
}
