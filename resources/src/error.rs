//! Error types for registration, dependency resolution and resource work.

use cairn_vfs::VfsError;
use thiserror::Error;

/// Errors surfaced by the registry, the factory, and resource operations.
///
/// `Clone` so a single failure can be stored on a group and delivered to
/// every listener of the completion event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Unknown source file, unknown group, or no data directory registered.
    #[error("not found: {0}")]
    NotFound(String),
    /// Illegal re-declaration of a non-overridable group.
    #[error("not supported: {0}")]
    NotSupported(String),
    /// Benign duplicate; absorbed by the registry, never returned from host calls.
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// Malformed group or resource definition.
    #[error("bad parameter: {0}")]
    BadParam(String),
    /// Allocation failure while constructing a resource.
    #[error("out of memory: {0}")]
    NoMemory(String),
    /// Unclassified failure reported by an underlying resource.
    #[error("{0}")]
    Generic(String),
    /// The dependency graph of a group cannot be resolved.
    #[error(transparent)]
    Dependency(#[from] ResolveError),
}

/// Failures of [`DependencyResolver::expand`](crate::DependencyResolver::expand).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The requested root group is not registered.
    #[error("unknown group '{0}'")]
    UnknownGroup(String),
    /// A registered group names a dependency that is not registered.
    #[error("group '{group}' depends on unknown group '{dependency}'")]
    UnknownDependency {
        /// Group declaring the dependency.
        group: String,
        /// The missing group name.
        dependency: String,
    },
    /// The dependency graph contains a cycle.
    #[error("cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency {
        /// Group names along the cycle; the first name is repeated at the end.
        cycle: Vec<String>,
    },
}

impl From<VfsError> for ResourceError {
    fn from(err: VfsError) -> Self {
        match err {
            VfsError::NotFound(path) => ResourceError::NotFound(path),
            VfsError::NoSuchSource(name) => {
                ResourceError::NotFound(format!("data directory '{name}'"))
            }
            VfsError::NoMounts => ResourceError::NotFound("no data directory registered".into()),
            VfsError::InvalidPath(reason) => ResourceError::BadParam(reason),
            VfsError::Io(err) => ResourceError::Generic(err.to_string()),
        }
    }
}
