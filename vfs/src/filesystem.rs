use std::path::{Path, PathBuf};

use crate::provider::{VfsFuture, VfsProvider};

/// File system data directory.
///
/// The root path is joined with the VFS path to form the actual filesystem
/// path. All I/O is blocking (`std::fs`) inside the returned futures.
///
/// Path traversal is prevented by the VFS path normalization which rejects
/// `..` segments before they reach the provider.
///
/// # Example
///
/// ```ignore
/// let mut vfs = Vfs::new();
/// vfs.mount("base", FileSystemProvider::new("./data"));
///
/// // Reads ./data/menus/main.toml
/// let bytes = poll_now(vfs.read_from("base", "menus/main.toml"))?;
/// ```
pub struct FileSystemProvider {
    root: PathBuf,
}

impl FileSystemProvider {
    /// Create a provider rooted at the given directory.
    ///
    /// The directory does not need to exist yet; it is checked
    /// at read time.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory this provider reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl VfsProvider for FileSystemProvider {
    fn read(&self, path: &str) -> VfsFuture<Vec<u8>> {
        let full_path = self.resolve(path);
        Box::pin(async move { Ok(std::fs::read(full_path)?) })
    }

    fn exists(&self, path: &str) -> VfsFuture<bool> {
        let full_path = self.resolve(path);
        Box::pin(async move { Ok(full_path.is_file()) })
    }

    fn describe(&self) -> String {
        format!("filesystem {:?}", self.root)
    }
}
