//! Group definitions (what a source declares) and registered groups (what
//! the registry owns).

use crate::resource::{ResourceHandle, ResourceKey, ResourceParams, ResourceState};

/// One `[[group.resource]]` entry of a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDefinition {
    pub key: ResourceKey,
    pub params: ResourceParams,
}

/// A group as declared by a source document, before registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupDefinition {
    pub name: String,
    pub resources: Vec<ResourceDefinition>,
    pub dependencies: Vec<String>,
    pub overridable: bool,
}

impl GroupDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Appends a resource without parameters.
    pub fn resource(self, type_name: impl Into<String>, name: impl Into<String>) -> Self {
        self.resource_with(type_name, name, ResourceParams::new())
    }

    /// Appends a resource with parameters.
    pub fn resource_with(
        mut self,
        type_name: impl Into<String>,
        name: impl Into<String>,
        params: ResourceParams,
    ) -> Self {
        self.resources.push(ResourceDefinition {
            key: ResourceKey::new(type_name, name),
            params,
        });
        self
    }

    /// Appends a dependency on another group.
    pub fn depends_on(mut self, group: impl Into<String>) -> Self {
        self.dependencies.push(group.into());
        self
    }

    pub fn overridable(mut self, overridable: bool) -> Self {
        self.overridable = overridable;
        self
    }
}

/// Lifecycle state of a registered group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Unloading,
}

/// A registered resource with its host-side state.
#[derive(Debug)]
pub struct ResourceEntry {
    key: ResourceKey,
    params: ResourceParams,
    state: ResourceState,
    handle: ResourceHandle,
}

impl ResourceEntry {
    pub(crate) fn new(key: ResourceKey, params: ResourceParams, handle: ResourceHandle) -> Self {
        Self {
            key,
            params,
            state: ResourceState::Unloaded,
            handle,
        }
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn params(&self) -> &ResourceParams {
        &self.params
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    pub(crate) fn set_state(&mut self, state: ResourceState) {
        self.state = state;
    }
}

/// A named, ordered collection of resources owned by the registry.
///
/// Resources keep their declaration order; that order is both the load and
/// the unload order.
#[derive(Debug)]
pub struct ResourceGroup {
    name: String,
    entries: Vec<ResourceEntry>,
    dependencies: Vec<String>,
    overridable: bool,
    state: GroupState,
}

impl ResourceGroup {
    pub(crate) fn new(
        name: String,
        entries: Vec<ResourceEntry>,
        dependencies: Vec<String>,
        overridable: bool,
    ) -> Self {
        Self {
            name,
            entries,
            dependencies,
            overridable,
            state: GroupState::Unloaded,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn is_overridable(&self) -> bool {
        self.overridable
    }

    /// Resources in declaration order.
    pub fn resources(&self) -> &[ResourceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resource(&self, key: &ResourceKey) -> Option<&ResourceEntry> {
        self.entries.iter().find(|e| &e.key == key)
    }

    pub(crate) fn position(&self, key: &ResourceKey) -> Option<usize> {
        self.entries.iter().position(|e| &e.key == key)
    }

    /// Whether `definition` declares exactly this group: same resources and
    /// parameters in the same order, same dependencies.
    pub fn matches(&self, definition: &GroupDefinition) -> bool {
        self.name == definition.name
            && self.dependencies == definition.dependencies
            && self.entries.len() == definition.resources.len()
            && self
                .entries
                .iter()
                .zip(&definition.resources)
                .all(|(entry, def)| entry.key == def.key && entry.params == def.params)
    }

    /// Indices of resources that still need a `load()`.
    pub(crate) fn indices_not_loaded(&self) -> Vec<usize> {
        (0..self.entries.len())
            .filter(|&i| self.entries[i].state != ResourceState::Loaded)
            .collect()
    }

    /// Indices of resources that need an `unload()`.
    pub(crate) fn indices_loaded(&self) -> Vec<usize> {
        (0..self.entries.len())
            .filter(|&i| self.entries[i].state == ResourceState::Loaded)
            .collect()
    }

    pub(crate) fn has_loaded_resources(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.state == ResourceState::Loaded)
    }

    pub(crate) fn set_state(&mut self, state: GroupState) {
        self.state = state;
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> Option<&mut ResourceEntry> {
        self.entries.get_mut(index)
    }

    pub(crate) fn push_entry(&mut self, entry: ResourceEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn push_dependency(&mut self, dependency: String) {
        self.dependencies.push(dependency);
    }

    pub(crate) fn set_overridable(&mut self, overridable: bool) {
        self.overridable = overridable;
    }
}
