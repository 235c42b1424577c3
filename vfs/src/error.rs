use std::fmt;

/// Errors that can occur while locating or reading data directory files.
#[derive(Debug)]
pub enum VfsError {
    /// The requested path was not found in the provider.
    NotFound(String),
    /// An IO error occurred while accessing a provider.
    Io(std::io::Error),
    /// The path is invalid (empty, contains `..`, or other normalization failure).
    InvalidPath(String),
    /// No data directory is mounted under the given name.
    NoSuchSource(String),
    /// A search was requested but no data directory is mounted at all.
    NoMounts,
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VfsError::NotFound(path) => write!(f, "not found: {path}"),
            VfsError::Io(err) => write!(f, "IO error: {err}"),
            VfsError::InvalidPath(reason) => write!(f, "invalid path: {reason}"),
            VfsError::NoSuchSource(name) => write!(f, "no such data directory: {name}"),
            VfsError::NoMounts => write!(f, "no data directory registered"),
        }
    }
}

impl std::error::Error for VfsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VfsError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for VfsError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            VfsError::NotFound(err.to_string())
        } else {
            VfsError::Io(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err = VfsError::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(matches!(err, VfsError::NotFound(_)));
    }

    #[test]
    fn display_no_mounts() {
        assert_eq!(VfsError::NoMounts.to_string(), "no data directory registered");
    }
}
