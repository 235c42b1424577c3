use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// How resource operations are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadingModel {
    /// Operations run inside `update()` on the calling thread.
    #[default]
    SingleThread,
    /// Operations run on one dedicated worker thread.
    MultiThread,
}

/// Construction options for [`ResourceManager`](crate::ResourceManager).
///
/// Usually loaded from a `resources.toml`:
///
/// ```toml
/// threading = "multi_thread"
/// operations_per_update = 4
/// stall_warning_ms = 2000
/// data_directories = ["data", "mods"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResourceManagerConfig {
    pub threading: ThreadingModel,
    /// Resource operations executed per `update()` in single-thread mode.
    pub operations_per_update: usize,
    /// A single resource still working for longer than this logs a warning.
    pub stall_warning_ms: u64,
    /// Filesystem directories mounted on construction, in search order.
    pub data_directories: Vec<PathBuf>,
}

impl Default for ResourceManagerConfig {
    fn default() -> Self {
        Self {
            threading: ThreadingModel::SingleThread,
            operations_per_update: 1,
            stall_warning_ms: 5000,
            data_directories: Vec::new(),
        }
    }
}

/// Failure to load a [`ResourceManagerConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse resource config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ResourceManagerConfig {
    pub fn single_thread() -> Self {
        Self::default()
    }

    pub fn multi_thread() -> Self {
        Self {
            threading: ThreadingModel::MultiThread,
            ..Self::default()
        }
    }

    pub fn with_threading(mut self, threading: ThreadingModel) -> Self {
        self.threading = threading;
        self
    }

    pub fn with_operations_per_update(mut self, operations: usize) -> Self {
        self.operations_per_update = operations;
        self
    }

    pub fn with_data_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_directories.push(path.into());
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Operations per update, never less than one.
    pub(crate) fn batch_size(&self) -> usize {
        self.operations_per_update.max(1)
    }
}
