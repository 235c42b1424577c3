use std::sync::Arc;

use crate::error::VfsError;
use crate::path;
use crate::provider::{VfsFuture, VfsProvider};

struct Mount {
    name: String,
    provider: Arc<dyn VfsProvider>,
}

/// Ordered set of mounted data directories.
///
/// Files are addressed either inside one named mount
/// ([`read_from`](Vfs::read_from)) or by searching every mount in the order
/// it was registered ([`locate`](Vfs::locate), [`read_any`](Vfs::read_any)).
/// The first mount containing the path wins, so later mounts never shadow
/// earlier ones.
///
/// `Clone` is cheap (providers are `Arc`-shared). Returned futures hold
/// their own snapshot of the mount list, so mounting more directories while
/// a future is alive is allowed.
///
/// # Example
///
/// ```ignore
/// let mut vfs = Vfs::new();
/// vfs.mount("base", FileSystemProvider::new("./data"));
/// vfs.mount("builtin", MemoryProvider::new());
///
/// let mount = poll_now(vfs.locate("menus/main.toml"))?;
/// let bytes = poll_now(vfs.read_from(&mount, "menus/main.toml"))?;
/// ```
#[derive(Clone, Default)]
pub struct Vfs {
    mounts: Vec<Mount>,
}

impl Clone for Mount {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            provider: Arc::clone(&self.provider),
        }
    }
}

impl Vfs {
    /// Create an empty VFS with no mounted data directories.
    pub fn new() -> Self {
        Self { mounts: Vec::new() }
    }

    /// Mount a provider under the given name.
    ///
    /// A new name is appended to the search order. Re-mounting an existing
    /// name replaces its provider but keeps its search position.
    pub fn mount(&mut self, name: impl Into<String>, provider: impl VfsProvider) {
        let name = name.into();
        log::info!("Data directory mount: \"{}\" -> {}", name, provider.describe());
        let provider: Arc<dyn VfsProvider> = Arc::new(provider);
        match self.mounts.iter_mut().find(|m| m.name == name) {
            Some(existing) => existing.provider = provider,
            None => self.mounts.push(Mount { name, provider }),
        }
    }

    /// Whether any data directory is mounted.
    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// Number of mounted data directories.
    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    /// Mount names in search order.
    pub fn mount_names(&self) -> impl Iterator<Item = &str> {
        self.mounts.iter().map(|m| m.name.as_str())
    }

    /// Whether a mount with the given name exists.
    pub fn has_mount(&self, name: &str) -> bool {
        self.mounts.iter().any(|m| m.name == name)
    }

    /// Read a file from one named mount.
    pub fn read_from(&self, mount: &str, raw_path: &str) -> VfsFuture<Vec<u8>> {
        let normalized = match path::normalize(raw_path) {
            Ok(p) => p,
            Err(e) => return Box::pin(async move { Err(e) }),
        };
        match self.mounts.iter().find(|m| m.name == mount) {
            Some(m) => m.provider.read(&normalized),
            None => {
                let mount = mount.to_owned();
                Box::pin(async move { Err(VfsError::NoSuchSource(mount)) })
            }
        }
    }

    /// Find the first mount, in search order, that contains the file.
    ///
    /// Resolves to the mount name. Fails with [`VfsError::NoMounts`] when
    /// nothing is mounted and [`VfsError::NotFound`] when no mount has it.
    pub fn locate(&self, raw_path: &str) -> VfsFuture<String> {
        let normalized = match path::normalize(raw_path) {
            Ok(p) => p,
            Err(e) => return Box::pin(async move { Err(e) }),
        };
        if self.mounts.is_empty() {
            return Box::pin(async { Err(VfsError::NoMounts) });
        }
        let mounts = self.mounts.clone();
        Box::pin(async move {
            for mount in &mounts {
                if mount.provider.exists(&normalized).await? {
                    return Ok(mount.name.clone());
                }
            }
            Err(VfsError::NotFound(normalized))
        })
    }

    /// Search every mount for the file and read the first hit.
    ///
    /// Resolves to `(mount name, contents)`.
    pub fn read_any(&self, raw_path: &str) -> VfsFuture<(String, Vec<u8>)> {
        let locate = self.locate(raw_path);
        let mounts = self.mounts.clone();
        let raw_path = raw_path.to_owned();
        Box::pin(async move {
            let name = locate.await?;
            let normalized = path::normalize(&raw_path)?;
            let provider = mounts
                .iter()
                .find(|m| m.name == name)
                .map(|m| Arc::clone(&m.provider))
                .ok_or_else(|| VfsError::NoSuchSource(name.clone()))?;
            let bytes = provider.read(&normalized).await?;
            Ok((name, bytes))
        })
    }
}
