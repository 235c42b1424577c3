//! # Cairn Demos
//!
//! Command-line programs exercising the resource manager end to end.
//!
//! ## Available Demos
//!
//! - `group_loader` - registers a definition source, loads groups, logs every event

use std::path::{Path, PathBuf};

use cairn_resources::{LoadOutcome, Resource, ResourceError, ResourceEvent, ResourceParams};

/// Demos library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A resource backed by one file, named by its `file` parameter.
///
/// The file is looked up in each search root in order, then as given.
/// Loading reads the whole file; unloading drops the bytes.
pub struct FileResource {
    roots: Vec<PathBuf>,
    file: PathBuf,
    bytes: Option<Vec<u8>>,
}

impl FileResource {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            file: PathBuf::new(),
            bytes: None,
        }
    }

    /// Size of the loaded contents, if loaded.
    pub fn loaded_size(&self) -> Option<usize> {
        self.bytes.as_ref().map(Vec::len)
    }

    fn resolve(&self) -> PathBuf {
        self.roots
            .iter()
            .map(|root| root.join(&self.file))
            .find(|candidate| candidate.is_file())
            .unwrap_or_else(|| self.file.clone())
    }
}

impl Resource for FileResource {
    fn create(&mut self, params: &ResourceParams) -> Result<(), ResourceError> {
        self.file = Path::new(params.require("file")?).to_path_buf();
        Ok(())
    }

    fn load(&mut self) -> LoadOutcome {
        let path = self.resolve();
        match std::fs::read(&path) {
            Ok(bytes) => {
                log::debug!("Read {} bytes from {}", bytes.len(), path.display());
                self.bytes = Some(bytes);
                LoadOutcome::Success
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                LoadOutcome::Failure(ResourceError::NotFound(path.display().to_string()))
            }
            Err(err) => LoadOutcome::Failure(ResourceError::Generic(format!(
                "{}: {err}",
                path.display()
            ))),
        }
    }

    fn unload(&mut self) -> LoadOutcome {
        self.bytes = None;
        LoadOutcome::Success
    }
}

/// One log line per event.
pub fn log_event(event: &ResourceEvent) {
    match event {
        ResourceEvent::Progress { processed, total } => {
            log::info!("Progress {processed}/{total}");
        }
        ResourceEvent::GroupLoaded { group, result: Ok(()) } => {
            log::info!("Group '{group}' loaded");
        }
        ResourceEvent::GroupLoaded { group, result: Err(err) } => {
            log::error!("Group '{group}' failed to load: {err}");
        }
        ResourceEvent::GroupUnloaded { group, result: Ok(()) } => {
            log::info!("Group '{group}' unloaded");
        }
        ResourceEvent::GroupUnloaded { group, result: Err(err) } => {
            log::error!("Group '{group}' failed to unload: {err}");
        }
    }
}
