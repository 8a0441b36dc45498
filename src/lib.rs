pub mod error;
pub mod extract;
pub mod installer;
pub mod package;
pub mod registry;
pub mod resolve;
pub mod runtime;
pub mod sexp;
pub mod vcs;
pub mod version;

pub use error::InstallError;
pub use installer::{Installer, Overwrite};
pub use package::{PackageDescriptor, PackageKind, Requirement, Upstream, VersionTuple};
pub use resolve::SpecResolver;
