//! The resource contract consumed by the scheduler.
//!
//! Concrete resource kinds (textures, sounds, fonts) live outside this crate.
//! The scheduler only sees the three capabilities of [`Resource`] and never
//! inspects the concrete type.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ResourceError;

/// Result of one `load()` or `unload()` step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The operation finished.
    Success,
    /// Partial progress was made; call again to continue.
    StillWorking,
    /// The operation failed.
    Failure(ResourceError),
}

/// A unit of loadable content.
///
/// `load` and `unload` may be called on the dedicated worker thread, hence
/// the `Send` bound. They are never called concurrently for one resource.
pub trait Resource: Any + Send {
    /// Applies the definition attributes. Called once, right after construction.
    fn create(&mut self, params: &ResourceParams) -> Result<(), ResourceError> {
        let _ = params;
        Ok(())
    }

    /// Performs (a step of) loading.
    fn load(&mut self) -> LoadOutcome;

    /// Performs (a step of) unloading.
    fn unload(&mut self) -> LoadOutcome;
}

/// Identity of a resource inside its group: (type name, instance name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    type_name: String,
    name: String,
}

impl ResourceKey {
    /// Creates a key from a type name and an instance name.
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    /// The resource type name used for factory lookup.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The instance name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.name)
    }
}

/// Per-resource lifecycle state, tracked on the host thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceState {
    /// Not loaded.
    #[default]
    Unloaded,
    /// A load has been issued and has not finished.
    Loading,
    /// Fully loaded.
    Loaded,
}

/// Extra definition attributes handed to [`Resource::create`].
///
/// Ordered so that two identical definitions compare equal regardless of
/// how the parser iterated them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceParams(BTreeMap<String, String>);

impl ResourceParams {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts or replaces a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Looks up a parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Looks up a parameter that must be present.
    pub fn require(&self, key: &str) -> Result<&str, ResourceError> {
        self.get(key)
            .ok_or_else(|| ResourceError::BadParam(format!("missing parameter '{key}'")))
    }

    /// Iterates parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Shared handle to a constructed resource.
///
/// Cloning is cheap. The worker thread receives clones of handles, never
/// references into the registry.
#[derive(Clone)]
pub struct ResourceHandle {
    inner: Arc<Mutex<Box<dyn Resource>>>,
}

impl ResourceHandle {
    /// Wraps a constructed resource.
    pub fn new(resource: Box<dyn Resource>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(resource)),
        }
    }

    /// Runs one load step.
    pub fn load(&self) -> LoadOutcome {
        self.inner.lock().load()
    }

    /// Runs one unload step.
    pub fn unload(&self) -> LoadOutcome {
        self.inner.lock().unload()
    }

    /// Borrows the resource as its concrete type.
    ///
    /// Returns `None` if the resource is not a `T`.
    pub fn with<T: Resource, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.inner.lock();
        let any: &dyn Any = &**guard;
        any.downcast_ref::<T>().map(f)
    }

    /// Whether two handles point at the same resource.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("refs", &Arc::strong_count(&self.inner))
            .finish()
    }
}
