use std::collections::{HashMap, HashSet};

use crate::error::ResourceError;
use crate::factory::ResourceFactory;
use crate::group::{GroupDefinition, GroupState, ResourceEntry, ResourceGroup};
use crate::resolver::DependencyResolver;

/// What [`ResourceRegistry::register_group`] did with a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// A new group was created.
    Created,
    /// A differing re-declaration was merged into the existing group.
    Merged,
    /// An identical re-declaration was ignored.
    DuplicateIgnored,
}

/// Owns every registered group.
///
/// Groups are stored in registration order and never removed except by
/// [`clear`](Self::clear), so a group's slot stays valid for the lifetime of
/// any plan that refers to it.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    groups: Vec<ResourceGroup>,
    index: HashMap<String, usize>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every definition in order. Stops at the first error;
    /// groups registered before it stay registered.
    pub fn add_definitions(
        &mut self,
        definitions: &[GroupDefinition],
        factory: &ResourceFactory,
    ) -> Result<Vec<RegisterOutcome>, ResourceError> {
        definitions
            .iter()
            .map(|def| self.register_group(def, factory))
            .collect()
    }

    /// Registers one group definition.
    ///
    /// An identical re-declaration is absorbed. A differing one is merged
    /// when either side is overridable and rejected with
    /// [`ResourceError::NotSupported`] otherwise.
    pub fn register_group(
        &mut self,
        definition: &GroupDefinition,
        factory: &ResourceFactory,
    ) -> Result<RegisterOutcome, ResourceError> {
        validate(definition)?;

        let Some(&slot) = self.index.get(&definition.name) else {
            let entries = definition
                .resources
                .iter()
                .map(|r| {
                    factory
                        .create(&r.key, &r.params)
                        .map(|handle| ResourceEntry::new(r.key.clone(), r.params.clone(), handle))
                })
                .collect::<Result<Vec<_>, _>>()?;
            log::debug!(
                "Registered group '{}' ({} resources)",
                definition.name,
                entries.len()
            );
            self.index.insert(definition.name.clone(), self.groups.len());
            self.groups.push(ResourceGroup::new(
                definition.name.clone(),
                entries,
                definition.dependencies.clone(),
                definition.overridable,
            ));
            return Ok(RegisterOutcome::Created);
        };

        if self.groups[slot].matches(definition) {
            log::debug!(
                "{}",
                ResourceError::AlreadyExists(format!("group '{}'", definition.name))
            );
            return Ok(RegisterOutcome::DuplicateIgnored);
        }

        if !self.groups[slot].is_overridable() && !definition.overridable {
            return Err(ResourceError::NotSupported(format!(
                "group '{}' is already registered and not overridable",
                definition.name
            )));
        }

        self.merge(slot, definition, factory)?;
        Ok(RegisterOutcome::Merged)
    }

    fn merge(
        &mut self,
        slot: usize,
        definition: &GroupDefinition,
        factory: &ResourceFactory,
    ) -> Result<(), ResourceError> {
        // Build every new handle before touching the group so a failing
        // constructor leaves it unchanged.
        let group = &self.groups[slot];
        let new_entries = definition
            .resources
            .iter()
            .filter(|r| group.position(&r.key).is_none())
            .map(|r| {
                factory
                    .create(&r.key, &r.params)
                    .map(|handle| ResourceEntry::new(r.key.clone(), r.params.clone(), handle))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let new_dependencies: Vec<String> = definition
            .dependencies
            .iter()
            .filter(|d| !group.dependencies().contains(*d))
            .cloned()
            .collect();

        let group = &mut self.groups[slot];
        let grew = !new_entries.is_empty() || !new_dependencies.is_empty();
        for entry in new_entries {
            group.push_entry(entry);
        }
        for dependency in new_dependencies {
            group.push_dependency(dependency);
        }
        let overridable = group.is_overridable() || definition.overridable;
        group.set_overridable(overridable);

        if grew && group.state() == GroupState::Loaded {
            let name = group.name().to_owned();
            log::warn!("Group '{name}' gained new content while loaded, load it again to complete");
            group.set_state(GroupState::Loading);
            self.demote_loaded_dependents(&name);
        } else {
            log::info!("Merged definition into group '{}'", group.name());
        }
        Ok(())
    }

    /// A group is only Loaded while all its dependencies are.
    fn demote_loaded_dependents(&mut self, name: &str) {
        for dependent in DependencyResolver::dependents(self, name) {
            let Some(slot) = self.slot(&dependent) else {
                continue;
            };
            let group = &mut self.groups[slot];
            if group.state() == GroupState::Loaded {
                log::warn!("Group '{dependent}' is no longer complete, '{name}' changed");
                group.set_state(GroupState::Loading);
            }
        }
    }

    pub fn group(&self, name: &str) -> Option<&ResourceGroup> {
        self.slot(name).map(|slot| &self.groups[slot])
    }

    pub fn group_state(&self, name: &str) -> Option<GroupState> {
        self.group(name).map(ResourceGroup::state)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceGroup> {
        self.groups.iter()
    }

    /// Every group that transitively depends on `name`, in registration order.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        DependencyResolver::dependents(self, name)
    }

    pub(crate) fn slot(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn group_at(&self, slot: usize) -> &ResourceGroup {
        &self.groups[slot]
    }

    pub(crate) fn group_at_mut(&mut self, slot: usize) -> &mut ResourceGroup {
        &mut self.groups[slot]
    }

    pub(crate) fn clear(&mut self) {
        self.groups.clear();
        self.index.clear();
    }
}

fn validate(definition: &GroupDefinition) -> Result<(), ResourceError> {
    if definition.name.is_empty() {
        return Err(ResourceError::BadParam("group name must not be empty".into()));
    }
    let mut seen = HashSet::new();
    for resource in &definition.resources {
        if resource.key.type_name().is_empty() || resource.key.name().is_empty() {
            return Err(ResourceError::BadParam(format!(
                "group '{}' has a resource without type or name",
                definition.name
            )));
        }
        if !seen.insert(&resource.key) {
            return Err(ResourceError::BadParam(format!(
                "group '{}' declares '{}' twice",
                definition.name, resource.key
            )));
        }
    }
    if definition.dependencies.iter().any(|d| d == &definition.name) {
        return Err(ResourceError::BadParam(format!(
            "group '{}' depends on itself",
            definition.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{LoadOutcome, Resource, ResourceKey, ResourceParams, ResourceState};

    struct Nop;

    impl Resource for Nop {
        fn load(&mut self) -> LoadOutcome {
            LoadOutcome::Success
        }

        fn unload(&mut self) -> LoadOutcome {
            LoadOutcome::Success
        }
    }

    fn factory() -> ResourceFactory {
        let mut factory = ResourceFactory::new();
        factory.register("t", || Box::new(Nop));
        factory
    }

    #[test]
    fn identical_redeclaration_is_ignored() {
        let factory = factory();
        let mut registry = ResourceRegistry::new();
        let def = GroupDefinition::new("menu").resource("t", "bg");
        assert_eq!(
            registry.register_group(&def, &factory).unwrap(),
            RegisterOutcome::Created
        );
        assert_eq!(
            registry.register_group(&def, &factory).unwrap(),
            RegisterOutcome::DuplicateIgnored
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn differing_non_overridable_is_rejected() {
        let factory = factory();
        let mut registry = ResourceRegistry::new();
        registry
            .register_group(&GroupDefinition::new("menu").resource("t", "bg"), &factory)
            .unwrap();
        let err = registry
            .register_group(&GroupDefinition::new("menu").resource("t", "fg"), &factory)
            .unwrap_err();
        assert!(matches!(err, ResourceError::NotSupported(_)));
        assert_eq!(registry.group("menu").unwrap().len(), 1);
    }

    #[test]
    fn overridable_merge_appends_and_keeps_existing() {
        let factory = factory();
        let mut registry = ResourceRegistry::new();
        registry
            .register_group(
                &GroupDefinition::new("menu")
                    .resource("t", "bg")
                    .overridable(true),
                &factory,
            )
            .unwrap();
        let original = registry.group("menu").unwrap().resources()[0]
            .handle()
            .clone();

        let outcome = registry
            .register_group(
                &GroupDefinition::new("menu")
                    .resource_with("t", "bg", ResourceParams::new().with("file", "x"))
                    .resource("t", "fg")
                    .depends_on("fonts"),
                &factory,
            )
            .unwrap();
        assert_eq!(outcome, RegisterOutcome::Merged);

        let group = registry.group("menu").unwrap();
        let keys: Vec<_> = group.resources().iter().map(|e| e.key().name()).collect();
        assert_eq!(keys, ["bg", "fg"]);
        assert!(group.resources()[0].handle().ptr_eq(&original));
        assert!(group.resources()[0].params().is_empty());
        assert_eq!(group.dependencies(), ["fonts"]);
    }

    #[test]
    fn merge_demotes_loaded_group() {
        let factory = factory();
        let mut registry = ResourceRegistry::new();
        registry
            .register_group(&GroupDefinition::new("g").resource("t", "a"), &factory)
            .unwrap();
        let slot = registry.slot("g").unwrap();
        let group = registry.group_at_mut(slot);
        group.entry_mut(0).unwrap().set_state(ResourceState::Loaded);
        group.set_state(GroupState::Loaded);

        registry
            .register_group(
                &GroupDefinition::new("g")
                    .resource("t", "b")
                    .overridable(true),
                &factory,
            )
            .unwrap();
        let group = registry.group("g").unwrap();
        assert_eq!(group.state(), GroupState::Loading);
        assert_eq!(
            group.resource(&ResourceKey::new("t", "a")).unwrap().state(),
            ResourceState::Loaded
        );
    }

    fn mark_loaded(registry: &mut ResourceRegistry, name: &str) {
        let slot = registry.slot(name).unwrap();
        let group = registry.group_at_mut(slot);
        for index in 0..group.len() {
            group.entry_mut(index).unwrap().set_state(ResourceState::Loaded);
        }
        group.set_state(GroupState::Loaded);
    }

    #[test]
    fn merge_demotes_loaded_dependents() {
        let factory = factory();
        let mut registry = ResourceRegistry::new();
        let defs = [
            GroupDefinition::new("base").resource("t", "a").overridable(true),
            GroupDefinition::new("top").depends_on("base").resource("t", "x"),
            GroupDefinition::new("other").resource("t", "y"),
        ];
        registry.add_definitions(&defs, &factory).unwrap();
        for name in ["base", "top", "other"] {
            mark_loaded(&mut registry, name);
        }

        registry
            .register_group(
                &GroupDefinition::new("base").resource("t", "a").resource("t", "b"),
                &factory,
            )
            .unwrap();
        assert_eq!(registry.group_state("base"), Some(GroupState::Loading));
        assert_eq!(registry.group_state("top"), Some(GroupState::Loading));
        assert_eq!(registry.group_state("other"), Some(GroupState::Loaded));
    }

    #[test]
    fn unknown_type_registers_nothing() {
        let factory = factory();
        let mut registry = ResourceRegistry::new();
        let err = registry
            .register_group(
                &GroupDefinition::new("g")
                    .resource("t", "a")
                    .resource("sound", "b"),
                &factory,
            )
            .unwrap_err();
        assert!(matches!(err, ResourceError::BadParam(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn malformed_definitions_are_bad_param() {
        let factory = factory();
        let mut registry = ResourceRegistry::new();
        for def in [
            GroupDefinition::new(""),
            GroupDefinition::new("g").resource("t", "a").resource("t", "a"),
            GroupDefinition::new("g").depends_on("g"),
        ] {
            assert!(matches!(
                registry.register_group(&def, &factory),
                Err(ResourceError::BadParam(_))
            ));
        }
    }

    #[test]
    fn add_definitions_keeps_earlier_groups_on_error() {
        let factory = factory();
        let mut registry = ResourceRegistry::new();
        let defs = [
            GroupDefinition::new("a").resource("t", "x"),
            GroupDefinition::new("b").resource("nope", "y"),
            GroupDefinition::new("c"),
        ];
        assert!(registry.add_definitions(&defs, &factory).is_err());
        assert!(registry.contains("a"));
        assert!(!registry.contains("b"));
        assert!(!registry.contains("c"));
    }

    #[test]
    fn iteration_follows_registration_order() {
        let factory = factory();
        let mut registry = ResourceRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry
                .register_group(&GroupDefinition::new(name), &factory)
                .unwrap();
        }
        let names: Vec<_> = registry.iter().map(ResourceGroup::name).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }
}
