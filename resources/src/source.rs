//! Declarative definition sources: parsing and include resolution.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use cairn_vfs::{FileSystemProvider, Vfs, VfsProvider, path, poll_now};
use serde::Deserialize;

use crate::error::ResourceError;
use crate::group::{GroupDefinition, ResourceDefinition};
use crate::resource::{ResourceKey, ResourceParams};

/// Another source a document pulls in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    pub path: String,
    /// Search every data directory instead of resolving next to the includer.
    pub auto_detect: bool,
}

/// The parsed form of one definition file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceDocument {
    pub groups: Vec<GroupDefinition>,
    pub includes: Vec<IncludeDirective>,
}

/// Turns the bytes of a definition file into a [`SourceDocument`].
///
/// `origin` names the file in error messages.
pub trait DefinitionParser: Send + Sync {
    fn parse(&self, origin: &str, bytes: &[u8]) -> Result<SourceDocument, ResourceError>;
}

/// Parser for the TOML definition format.
///
/// ```toml
/// [[include]]
/// path = "common/fonts.toml"
/// auto_detect = true
///
/// [[group]]
/// name = "menu"
/// dependencies = ["fonts"]
///
/// [[group.resource]]
/// type = "texture"
/// name = "background"
/// file = "menu/bg.png"
/// ```
///
/// Resource keys other than `type` and `name` become [`ResourceParams`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlDefinitionParser;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    #[serde(default)]
    include: Vec<RawInclude>,
    #[serde(default)]
    group: Vec<RawGroup>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInclude {
    path: String,
    #[serde(default)]
    auto_detect: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGroup {
    name: String,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    overridable: bool,
    #[serde(default)]
    resource: Vec<RawResource>,
}

#[derive(Deserialize)]
struct RawResource {
    #[serde(rename = "type")]
    type_name: String,
    name: String,
    #[serde(flatten)]
    params: BTreeMap<String, toml::Value>,
}

impl DefinitionParser for TomlDefinitionParser {
    fn parse(&self, origin: &str, bytes: &[u8]) -> Result<SourceDocument, ResourceError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ResourceError::BadParam(format!("{origin}: not UTF-8: {e}")))?;
        let raw: RawDocument = toml::from_str(text)
            .map_err(|e| ResourceError::BadParam(format!("{origin}: {e}")))?;

        let groups = raw
            .group
            .into_iter()
            .map(|g| {
                let resources = g
                    .resource
                    .into_iter()
                    .map(|r| {
                        let params = convert_params(origin, &r.name, r.params)?;
                        Ok(ResourceDefinition {
                            key: ResourceKey::new(r.type_name, r.name),
                            params,
                        })
                    })
                    .collect::<Result<Vec<_>, ResourceError>>()?;
                Ok(GroupDefinition {
                    name: g.name,
                    resources,
                    dependencies: g.dependencies,
                    overridable: g.overridable,
                })
            })
            .collect::<Result<Vec<_>, ResourceError>>()?;

        let includes = raw
            .include
            .into_iter()
            .map(|i| IncludeDirective {
                path: i.path,
                auto_detect: i.auto_detect,
            })
            .collect();

        Ok(SourceDocument { groups, includes })
    }
}

fn convert_params(
    origin: &str,
    resource: &str,
    raw: BTreeMap<String, toml::Value>,
) -> Result<ResourceParams, ResourceError> {
    let mut params = ResourceParams::new();
    for (key, value) in raw {
        let value = match value {
            toml::Value::String(s) => s,
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            toml::Value::Datetime(d) => d.to_string(),
            toml::Value::Array(_) | toml::Value::Table(_) => {
                return Err(ResourceError::BadParam(format!(
                    "{origin}: parameter '{key}' of resource '{resource}' must be a scalar"
                )));
            }
        };
        params.insert(key, value);
    }
    Ok(params)
}

/// Where a definition file lives: a mounted data directory or a plain
/// filesystem directory given by the host.
#[derive(Clone)]
enum Origin {
    Mount(String),
    Directory(Arc<FileSystemProvider>),
}

impl Origin {
    fn label(&self, path: &str) -> String {
        match self {
            Origin::Mount(name) => format!("{name}:{path}"),
            Origin::Directory(provider) => provider.root().join(path).display().to_string(),
        }
    }

    fn read(&self, vfs: &Vfs, path: &str) -> Result<Vec<u8>, ResourceError> {
        let bytes = match self {
            Origin::Mount(name) => poll_now(vfs.read_from(name, path))?,
            Origin::Directory(provider) => poll_now(provider.read(path))?,
        };
        Ok(bytes)
    }
}

/// Reads one top-level source and everything it includes.
///
/// Each file is visited at most once per loader. Definitions come out in
/// processing order: a document's includes before its own groups.
pub(crate) struct SourceLoader<'a> {
    vfs: &'a Vfs,
    parser: &'a dyn DefinitionParser,
    visited: HashSet<String>,
    definitions: Vec<GroupDefinition>,
}

impl<'a> SourceLoader<'a> {
    pub(crate) fn new(vfs: &'a Vfs, parser: &'a dyn DefinitionParser) -> Self {
        Self {
            vfs,
            parser,
            visited: HashSet::new(),
            definitions: Vec::new(),
        }
    }

    pub(crate) fn load(
        mut self,
        source: &str,
        auto_detect: bool,
    ) -> Result<Vec<GroupDefinition>, ResourceError> {
        let (origin, path) = if auto_detect {
            self.detect(source)?
        } else {
            direct(source)?
        };
        self.visit(origin, path)?;
        Ok(self.definitions)
    }

    fn detect(&self, source: &str) -> Result<(Origin, String), ResourceError> {
        let mount = poll_now(self.vfs.locate(source))?;
        Ok((Origin::Mount(mount), path::normalize(source)?))
    }

    fn visit(&mut self, origin: Origin, path: String) -> Result<(), ResourceError> {
        let label = origin.label(&path);
        if !self.visited.insert(label.clone()) {
            log::debug!("Skipping {label}, already processed");
            return Ok(());
        }

        let bytes = origin.read(self.vfs, &path)?;
        let document = self.parser.parse(&label, &bytes)?;
        log::info!(
            "Resource source {label}: {} groups, {} includes",
            document.groups.len(),
            document.includes.len()
        );

        for include in &document.includes {
            let (next_origin, next_path) = if include.auto_detect {
                self.detect(&include.path)?
            } else {
                (origin.clone(), path::sibling(&path, &include.path)?)
            };
            self.visit(next_origin, next_path)?;
        }
        self.definitions.extend(document.groups);
        Ok(())
    }
}

/// Splits a host-given filesystem path into a directory origin and a file name.
fn direct(source: &str) -> Result<(Origin, String), ResourceError> {
    let file = Path::new(source);
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ResourceError::BadParam(format!("'{source}' does not name a file")))?;
    let dir = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    Ok((
        Origin::Directory(Arc::new(FileSystemProvider::new(dir))),
        path::normalize(name)?,
    ))
}
