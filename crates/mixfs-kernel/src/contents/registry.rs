//! Backend registry: maps backend identifiers from configuration to
//! constructors.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::backends::{LocalBackend, LocalOptions, MemoryBackend, MemoryOptions};
use super::error::ConfigError;
use super::ops::ContentsOps;

/// Where a backend is being mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountContext {
    /// Virtual prefix of the owning router.
    pub prefix: String,
    /// Mount name, or `"default"` for the fallback backend.
    pub mount: String,
}

/// Builds a backend from its mount context and option map.
pub type BackendFactory = Arc<
    dyn Fn(&MountContext, &Map<String, Value>) -> Result<Arc<dyn ContentsOps>, ConfigError>
        + Send
        + Sync,
>;

/// Registered backend factories.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.factories.keys().collect();
        ids.sort();
        f.debug_struct("BackendRegistry").field("factories", &ids).finish()
    }
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the `memory` and `local` backends.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("memory", |ctx, options| {
            let _: MemoryOptions = parse_options(ctx, options)?;
            Ok(Arc::new(MemoryBackend::new()) as Arc<dyn ContentsOps>)
        });
        registry.register("local", |ctx, options| {
            let opts: LocalOptions = parse_options(ctx, options)?;
            Ok(Arc::new(LocalBackend::from_options(opts)) as Arc<dyn ContentsOps>)
        });
        registry
    }

    /// Register a factory under `id`, replacing any previous one.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&MountContext, &Map<String, Value>) -> Result<Arc<dyn ContentsOps>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    /// Returns true if a factory is registered under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Construct the backend registered as `id`.
    pub fn create(
        &self,
        id: &str,
        ctx: &MountContext,
        options: &Map<String, Value>,
    ) -> Result<Arc<dyn ContentsOps>, ConfigError> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| ConfigError::UnknownBackend {
                mount: ctx.mount.clone(),
                backend: id.to_string(),
            })?;
        factory(ctx, options)
    }
}

/// Deserialize a factory's typed options from the raw option map.
pub fn parse_options<T: DeserializeOwned>(
    ctx: &MountContext,
    options: &Map<String, Value>,
) -> Result<T, ConfigError> {
    serde_json::from_value(Value::Object(options.clone())).map_err(|e| {
        ConfigError::InvalidOptions {
            mount: ctx.mount.clone(),
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> MountContext {
        MountContext {
            prefix: "datahub".into(),
            mount: "space1".into(),
        }
    }

    #[test]
    fn test_builtin_ids() {
        let registry = BackendRegistry::with_builtin();
        assert!(registry.contains("memory"));
        assert!(registry.contains("local"));
        assert!(!registry.contains("onedata"));
    }

    #[test]
    fn test_unknown_option_rejected() {
        let registry = BackendRegistry::with_builtin();
        let options = json!({ "space": "/space1" });
        let Value::Object(options) = options else { unreachable!() };
        let err = registry.create("memory", &ctx(), &options).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidOptions { mount, .. } if mount == "space1"));
    }

    #[test]
    fn test_local_requires_root() {
        let registry = BackendRegistry::with_builtin();
        let err = registry.create("local", &ctx(), &Map::new()).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidOptions { .. }));
    }

    #[test]
    fn test_custom_factory_receives_context() {
        let mut registry = BackendRegistry::new();
        registry.register("custom", |ctx, _| {
            assert_eq!(ctx.mount, "space1");
            assert_eq!(ctx.prefix, "datahub");
            Ok(Arc::new(MemoryBackend::new()) as Arc<dyn ContentsOps>)
        });
        assert!(registry.create("custom", &ctx(), &Map::new()).is_ok());
    }
}
