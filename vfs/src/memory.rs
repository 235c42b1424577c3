use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::VfsError;
use crate::provider::{VfsFuture, VfsProvider};

/// In-memory data directory for tests and embedded definitions.
///
/// Thread-safe and mutable even after being mounted in a [`Vfs`](crate::Vfs).
///
/// # Example
///
/// ```ignore
/// let mem = MemoryProvider::new();
/// mem.insert("menus/main.toml", definition_bytes);
///
/// let mut vfs = Vfs::new();
/// vfs.mount("builtin", mem);
/// ```
#[derive(Clone)]
pub struct MemoryProvider {
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryProvider {
    /// Create an empty in-memory provider.
    pub fn new() -> Self {
        Self {
            files: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a file at the given path.
    ///
    /// The path should use forward slashes and have no leading slash.
    /// Overwrites any existing file at the same path.
    pub fn insert(&self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.files.write().insert(path.into(), data.into());
    }

    /// Remove a file at the given path, returning its data if it existed.
    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        self.files.write().remove(path)
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    /// Whether the provider holds no files.
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl VfsProvider for MemoryProvider {
    fn read(&self, path: &str) -> VfsFuture<Vec<u8>> {
        let files = self.files.clone();
        let path = path.to_owned();
        Box::pin(async move {
            let map = files.read();
            map.get(&path).cloned().ok_or(VfsError::NotFound(path))
        })
    }

    fn exists(&self, path: &str) -> VfsFuture<bool> {
        let files = self.files.clone();
        let path = path.to_owned();
        Box::pin(async move { Ok(files.read().contains_key(&path)) })
    }

    fn describe(&self) -> String {
        format!("memory ({} files)", self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll_now;

    #[test]
    fn read_existing_file() {
        let mem = MemoryProvider::new();
        mem.insert("groups.toml", "[[group]]");
        let result = poll_now(mem.read("groups.toml")).unwrap();
        assert_eq!(result, b"[[group]]");
    }

    #[test]
    fn read_missing_file() {
        let mem = MemoryProvider::new();
        let result = poll_now(mem.read("nope.toml"));
        assert!(matches!(result, Err(VfsError::NotFound(_))));
    }

    #[test]
    fn exists_reflects_inserts_and_removes() {
        let mem = MemoryProvider::new();
        mem.insert("file.toml", Vec::new());
        assert!(poll_now(mem.exists("file.toml")).unwrap());

        assert_eq!(mem.remove("file.toml"), Some(Vec::new()));
        assert!(!poll_now(mem.exists("file.toml")).unwrap());
        assert!(mem.is_empty());
    }

    #[test]
    fn clones_share_storage() {
        let mem = MemoryProvider::new();
        let other = mem.clone();
        other.insert("late.toml", "x");
        assert!(poll_now(mem.exists("late.toml")).unwrap());
        assert_eq!(mem.len(), 1);
    }
}
