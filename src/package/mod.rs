//! Package data model: descriptors, dependency requirements, and the
//! source-file header conventions they are read from.

pub mod descriptor;
pub mod headers;
pub mod requirement;
pub mod writer;

pub use descriptor::{PackageDescriptor, PackageKind, Upstream};
pub use requirement::{Requirement, VersionTuple};
