use std::collections::HashMap;

use crate::error::ResourceError;
use crate::resource::{Resource, ResourceHandle, ResourceKey, ResourceParams};

type Constructor = Box<dyn Fn() -> Box<dyn Resource> + Send + Sync>;

/// Maps resource type names to constructors.
///
/// The registry asks the factory for a fresh resource for every new entry
/// of a group definition; it never sees the concrete type.
///
/// # Example
///
/// ```ignore
/// let mut factory = ResourceFactory::new();
/// factory.register("texture", || Box::new(Texture::default()));
/// let handle = factory.create(&ResourceKey::new("texture", "logo"), &params)?;
/// ```
#[derive(Default)]
pub struct ResourceFactory {
    constructors: HashMap<String, Constructor>,
}

impl ResourceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor for `type_name`, replacing any previous one.
    pub fn register<F>(&mut self, type_name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn Resource> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        if self
            .constructors
            .insert(type_name.clone(), Box::new(constructor))
            .is_some()
        {
            log::warn!("Resource type '{type_name}' registered twice, replacing constructor");
        }
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Constructs the resource for `key` and applies its parameters.
    pub fn create(
        &self,
        key: &ResourceKey,
        params: &ResourceParams,
    ) -> Result<ResourceHandle, ResourceError> {
        let constructor = self.constructors.get(key.type_name()).ok_or_else(|| {
            ResourceError::BadParam(format!(
                "unknown resource type '{}' for '{}'",
                key.type_name(),
                key.name()
            ))
        })?;
        let mut resource = constructor();
        resource.create(params)?;
        Ok(ResourceHandle::new(resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::LoadOutcome;

    #[derive(Default)]
    struct Sprite {
        size: u32,
    }

    impl Resource for Sprite {
        fn create(&mut self, params: &ResourceParams) -> Result<(), ResourceError> {
            self.size = params
                .require("size")?
                .parse()
                .map_err(|_| ResourceError::BadParam("size must be a number".into()))?;
            Ok(())
        }

        fn load(&mut self) -> LoadOutcome {
            LoadOutcome::Success
        }

        fn unload(&mut self) -> LoadOutcome {
            LoadOutcome::Success
        }
    }

    fn factory() -> ResourceFactory {
        let mut factory = ResourceFactory::new();
        factory.register("sprite", || Box::new(Sprite::default()));
        factory
    }

    #[test]
    fn creates_and_applies_params() {
        let handle = factory()
            .create(
                &ResourceKey::new("sprite", "a"),
                &ResourceParams::new().with("size", "12"),
            )
            .unwrap();
        assert_eq!(handle.with(|s: &Sprite| s.size), Some(12));
    }

    #[test]
    fn unknown_type_is_bad_param() {
        let err = factory()
            .create(&ResourceKey::new("sound", "a"), &ResourceParams::new())
            .unwrap_err();
        assert!(matches!(err, ResourceError::BadParam(_)));
    }

    #[test]
    fn create_error_propagates() {
        let err = factory()
            .create(
                &ResourceKey::new("sprite", "a"),
                &ResourceParams::new().with("size", "big"),
            )
            .unwrap_err();
        assert_eq!(err, ResourceError::BadParam("size must be a number".into()));
    }

    #[test]
    fn reregistering_replaces() {
        let mut factory = factory();
        factory.register("sprite", || Box::new(Sprite { size: 7 }));
        assert_eq!(factory.len(), 1);
        assert!(factory.contains("sprite"));
    }
}
