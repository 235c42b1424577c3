//! Resource groups and their asynchronous load/unload scheduler.
//!
//! A host declares named groups of resources in definition files, registers
//! the resource types it knows how to build, and asks for groups by name.
//! The [`ResourceManager`] resolves group dependencies, runs resource
//! operations either inside [`ResourceManager::update`] or on a dedicated
//! worker thread, and reports progress and completion to listeners.
//!
//! # Architecture
//!
//! - [`ResourceRegistry`] owns every [`ResourceGroup`] in registration order.
//! - [`DependencyResolver`] expands a group into the dependency-first list
//!   of groups it needs.
//! - The scheduler queues top-level requests FIFO and executes one at a
//!   time through a [`LoadScheduler`] (cooperative or worker thread).
//! - Listeners receive [`ResourceEvent`]s on the host thread and may queue
//!   more requests; those start on a later update.
//!
//! ```ignore
//! let mut manager = ResourceManager::new(ResourceManagerConfig::multi_thread())?;
//! manager.add_data_directory("data");
//! manager.register_resource_type("texture", || Box::new(Texture::default()));
//! manager.add_resources("menus/main.toml", true)?;
//! manager.load_group("menu")?;
//! manager.wait_idle(Duration::from_secs(10))?;
//! ```

mod config;
mod error;
mod event;
mod factory;
mod group;
mod manager;
mod progress;
mod registry;
mod resolver;
mod resource;
mod scheduler;
mod source;

pub use config::{ConfigError, ResourceManagerConfig, ThreadingModel};
pub use error::{ResolveError, ResourceError};
pub use event::{Listener, ListenerId, ResourceEvent};
pub use factory::ResourceFactory;
pub use group::{GroupDefinition, GroupState, ResourceDefinition, ResourceEntry, ResourceGroup};
pub use manager::ResourceManager;
pub use progress::ProgressTracker;
pub use registry::{RegisterOutcome, ResourceRegistry};
pub use resolver::DependencyResolver;
pub use resource::{
    LoadOutcome, Resource, ResourceHandle, ResourceKey, ResourceParams, ResourceState,
};
pub use scheduler::{
    IdleTimeout, LoadScheduler, MultiThreadScheduler, RequestKind, SingleThreadScheduler,
};
pub use source::{DefinitionParser, IncludeDirective, SourceDocument, TomlDefinitionParser};
