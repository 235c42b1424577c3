use std::path::Path;
use std::time::{Duration, Instant};

use cairn_vfs::{FileSystemProvider, Vfs, VfsProvider};

use crate::config::{ResourceManagerConfig, ThreadingModel};
use crate::error::ResourceError;
use crate::event::{Listener, ListenerId, ListenerSet, ResourceEvent};
use crate::factory::ResourceFactory;
use crate::group::{GroupDefinition, GroupState};
use crate::progress::ProgressTracker;
use crate::registry::{RegisterOutcome, ResourceRegistry};
use crate::resource::{Resource, ResourceHandle, ResourceKey, ResourceState};
use crate::scheduler::plan::Planner;
use crate::scheduler::{IdleTimeout, LoadScheduler, RequestKind};
use crate::source::{DefinitionParser, SourceLoader, TomlDefinitionParser};

/// Host-facing entry point: owns the registry, the factory, the data
/// directories, the scheduler and the listeners.
///
/// All methods are called from the host thread. Group state and events only
/// change inside [`update`](Self::update).
///
/// # Example
///
/// ```ignore
/// let mut manager = ResourceManager::new(ResourceManagerConfig::default())?;
/// manager.add_data_directory("data");
/// manager.register_resource_type("texture", || Box::new(Texture::default()));
/// manager.add_resources("menus/main.toml", true)?;
///
/// manager.subscribe(|manager, event| {
///     if let ResourceEvent::GroupLoaded { group, result: Ok(()) } = event {
///         if group == "menu" {
///             let _ = manager.load_group("game");
///         }
///     }
/// });
/// manager.load_group("menu")?;
///
/// loop {
///     manager.update(frame_time);
/// }
/// ```
pub struct ResourceManager {
    config: ResourceManagerConfig,
    vfs: Vfs,
    parser: Box<dyn DefinitionParser>,
    factory: ResourceFactory,
    registry: ResourceRegistry,
    planner: Planner,
    scheduler: LoadScheduler,
    listeners: ListenerSet,
    dispatching: bool,
}

impl ResourceManager {
    /// Creates a manager and mounts the configured data directories.
    ///
    /// Fails only when the worker thread cannot be started.
    pub fn new(config: ResourceManagerConfig) -> Result<Self, ResourceError> {
        let scheduler = LoadScheduler::from_config(&config)?;
        let mut manager = Self {
            config,
            vfs: Vfs::new(),
            parser: Box::new(TomlDefinitionParser),
            factory: ResourceFactory::new(),
            registry: ResourceRegistry::new(),
            planner: Planner::new(),
            scheduler,
            listeners: ListenerSet::default(),
            dispatching: false,
        };
        let directories = manager.config.data_directories.clone();
        for directory in directories {
            manager.add_data_directory(directory);
        }
        Ok(manager)
    }

    /// Replaces the definition parser.
    pub fn with_parser(mut self, parser: impl DefinitionParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn config(&self) -> &ResourceManagerConfig {
        &self.config
    }

    pub fn threading(&self) -> ThreadingModel {
        self.scheduler.threading()
    }

    /// Mounts a filesystem directory at the end of the search order.
    ///
    /// The mount is named after the path.
    pub fn add_data_directory(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.vfs
            .mount(path.display().to_string(), FileSystemProvider::new(path));
    }

    /// Mounts any provider at the end of the search order.
    pub fn add_data_provider(&mut self, name: impl Into<String>, provider: impl VfsProvider) {
        self.vfs.mount(name, provider);
    }

    pub fn data_directories(&self) -> impl Iterator<Item = &str> {
        self.vfs.mount_names()
    }

    pub fn register_resource_type<F>(&mut self, type_name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn Resource> + Send + Sync + 'static,
    {
        self.factory.register(type_name, constructor);
    }

    /// Reads a definition source and registers every group it declares.
    ///
    /// With `auto_detect` the source is searched in every data directory;
    /// otherwise it is a filesystem path. Includes are followed and each
    /// file is read once. Groups registered before an error stay registered.
    pub fn add_resources(&mut self, source: &str, auto_detect: bool) -> Result<(), ResourceError> {
        let definitions =
            SourceLoader::new(&self.vfs, self.parser.as_ref()).load(source, auto_detect)?;
        let mut created = 0;
        for definition in &definitions {
            let outcome = self.registry.register_group(definition, &self.factory)?;
            if outcome == RegisterOutcome::Created {
                created += 1;
            }
        }
        log::info!(
            "Registered resources from '{source}': {} definitions, {created} new groups",
            definitions.len()
        );
        Ok(())
    }

    /// Registers a group definition built in code.
    pub fn register_group(
        &mut self,
        definition: &GroupDefinition,
    ) -> Result<RegisterOutcome, ResourceError> {
        self.registry.register_group(definition, &self.factory)
    }

    /// Queues loading `name` and everything it depends on.
    ///
    /// Returns once the request is accepted. Completion is reported through
    /// [`ResourceEvent::GroupLoaded`].
    pub fn load_group(&mut self, name: &str) -> Result<(), ResourceError> {
        self.planner.request_load(&mut self.registry, name)
    }

    /// Queues unloading `name`, the groups depending on it, and the
    /// dependencies nothing else still holds.
    ///
    /// Unknown groups are ignored.
    pub fn unload_group(&mut self, name: &str) -> Result<(), ResourceError> {
        self.planner.request_unload(&mut self.registry, name)
    }

    /// Advances outstanding work and dispatches the resulting events.
    ///
    /// `delta` is the time since the previous call. Calling this from a
    /// listener does nothing.
    pub fn update(&mut self, delta: Duration) {
        if self.dispatching {
            log::warn!("ResourceManager::update called from a listener, ignored");
            return;
        }
        let mut events = Vec::new();
        self.scheduler
            .update(&mut self.planner, &mut self.registry, delta, &mut events);
        self.dispatch(&events);
    }

    fn dispatch(&mut self, events: &[ResourceEvent]) {
        if events.is_empty() {
            return;
        }
        let mut listeners = self.listeners.take();
        self.dispatching = true;
        for event in events {
            for (id, listener) in listeners.iter_mut() {
                if !self.listeners.is_removed(*id) {
                    listener(self, event);
                }
            }
        }
        self.dispatching = false;
        self.listeners.restore(listeners);
    }

    /// Calls `update` until no work is outstanding or `budget` elapses.
    pub fn wait_idle(&mut self, budget: Duration) -> Result<(), IdleTimeout> {
        let timeout = |manager: &Self| IdleTimeout::Timeout {
            remaining_requests: manager.planner.outstanding(),
        };
        if self.dispatching {
            return if self.is_idle() { Ok(()) } else { Err(timeout(self)) };
        }

        let start = Instant::now();
        let mut last = start;
        loop {
            let now = Instant::now();
            self.update(now - last);
            last = now;
            if self.is_idle() {
                return Ok(());
            }
            if start.elapsed() >= budget {
                return Err(timeout(self));
            }
            match self.threading() {
                ThreadingModel::SingleThread => {}
                ThreadingModel::MultiThread => std::thread::sleep(Duration::from_millis(1)),
            }
        }
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&mut ResourceManager, &ResourceEvent) + Send + 'static,
    {
        let listener: Listener = Box::new(listener);
        self.listeners.add(listener)
    }

    /// Returns `false` if no listener has that id. A listener removed from
    /// inside a dispatch gets no further events of that dispatch.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn group_state(&self, name: &str) -> Option<GroupState> {
        self.registry.group_state(name)
    }

    pub fn resource_state(&self, group: &str, key: &ResourceKey) -> Option<ResourceState> {
        self.registry
            .group(group)
            .and_then(|g| g.resource(key))
            .map(|e| e.state())
    }

    pub fn resource(&self, group: &str, key: &ResourceKey) -> Option<ResourceHandle> {
        self.registry
            .group(group)
            .and_then(|g| g.resource(key))
            .map(|e| e.handle().clone())
    }

    /// Counters of the active (or most recently finished) request.
    pub fn progress(&self) -> ProgressTracker {
        *self.planner.progress()
    }

    /// The request currently being executed.
    pub fn active_request(&self) -> Option<(RequestKind, &str)> {
        self.planner.active_request()
    }

    pub fn is_idle(&self) -> bool {
        self.planner.is_idle()
    }

    /// Drops every registered group. Only allowed while idle.
    pub fn clear(&mut self) -> Result<(), ResourceError> {
        if !self.is_idle() {
            return Err(ResourceError::Generic(
                "cannot clear resources while requests are outstanding".into(),
            ));
        }
        log::info!("Clearing {} resource groups", self.registry.len());
        self.registry.clear();
        self.planner.reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cairn_vfs::MemoryProvider;
    use parking_lot::Mutex;

    use super::*;
    use crate::resource::LoadOutcome;

    struct Nop;

    impl Resource for Nop {
        fn load(&mut self) -> LoadOutcome {
            LoadOutcome::Success
        }

        fn unload(&mut self) -> LoadOutcome {
            LoadOutcome::Success
        }
    }

    fn manager_with(files: &[(&str, &str)]) -> ResourceManager {
        let memory = MemoryProvider::new();
        for (path, text) in files {
            memory.insert(*path, text.as_bytes());
        }
        let mut manager = ResourceManager::new(ResourceManagerConfig::default()).unwrap();
        manager.add_data_provider("memory", memory);
        manager.register_resource_type("t", || Box::new(Nop));
        manager
    }

    const MENU: &str = r#"
        [[group]]
        name = "menu"
        [[group.resource]]
        type = "t"
        name = "bg"
    "#;

    #[test]
    fn add_resources_twice_is_idempotent() {
        let mut manager = manager_with(&[("menu.toml", MENU)]);
        manager.add_resources("menu.toml", true).unwrap();
        manager.add_resources("menu.toml", true).unwrap();
        assert_eq!(manager.registry().len(), 1);
    }

    #[test]
    fn load_then_wait_idle() {
        let mut manager = manager_with(&[("menu.toml", MENU)]);
        manager.add_resources("menu.toml", true).unwrap();
        manager.load_group("menu").unwrap();
        assert_eq!(manager.group_state("menu"), Some(GroupState::Loading));
        manager.wait_idle(Duration::from_secs(5)).unwrap();
        assert_eq!(manager.group_state("menu"), Some(GroupState::Loaded));
        assert_eq!(
            manager.resource_state("menu", &ResourceKey::new("t", "bg")),
            Some(ResourceState::Loaded)
        );
        assert_eq!(manager.progress().snapshot(), (1, 1));
    }

    #[test]
    fn listener_unsubscribes_itself() {
        let mut manager = manager_with(&[("menu.toml", MENU)]);
        manager.add_resources("menu.toml", true).unwrap();
        let seen = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&seen);
        let id = Arc::new(Mutex::new(None));
        let own_id = Arc::clone(&id);
        let removed = Arc::new(Mutex::new(false));
        let removed_flag = Arc::clone(&removed);
        let listener = manager.subscribe(move |manager, _| {
            *counter.lock() += 1;
            if let Some(id) = *own_id.lock() {
                *removed_flag.lock() = manager.unsubscribe(id);
            }
        });
        *id.lock() = Some(listener);

        manager.load_group("menu").unwrap();
        manager.wait_idle(Duration::from_secs(5)).unwrap();
        // Progress and GroupLoaded arrive in the same update; only the
        // first reaches the listener.
        assert_eq!(*seen.lock(), 1);
        assert!(*removed.lock());
        assert!(!manager.unsubscribe(listener));

        manager.unload_group("menu").unwrap();
        manager.wait_idle(Duration::from_secs(5)).unwrap();
        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn clear_requires_idle() {
        let mut manager = manager_with(&[("menu.toml", MENU)]);
        manager.add_resources("menu.toml", true).unwrap();
        manager.load_group("menu").unwrap();
        assert!(matches!(manager.clear(), Err(ResourceError::Generic(_))));
        manager.wait_idle(Duration::from_secs(5)).unwrap();
        manager.clear().unwrap();
        assert!(manager.registry().is_empty());
        assert!(matches!(
            manager.load_group("menu"),
            Err(ResourceError::NotFound(_))
        ));
    }

    #[test]
    fn update_from_listener_is_ignored() {
        let mut manager = manager_with(&[("menu.toml", MENU)]);
        manager.add_resources("menu.toml", true).unwrap();
        manager.subscribe(|manager, _| manager.update(Duration::ZERO));
        manager.load_group("menu").unwrap();
        manager.wait_idle(Duration::from_secs(5)).unwrap();
        assert_eq!(manager.group_state("menu"), Some(GroupState::Loaded));
    }

    #[test]
    fn configured_directories_are_mounted() {
        let config = ResourceManagerConfig::default().with_data_directory("data");
        let manager = ResourceManager::new(config).unwrap();
        assert_eq!(manager.data_directories().collect::<Vec<_>>(), ["data"]);
    }
}
