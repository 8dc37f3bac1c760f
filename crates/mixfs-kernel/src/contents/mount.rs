//! Mount table: named backends under the virtual prefix.
//!
//! Built once from configuration and never mutated afterwards, so lookups
//! take no lock.

use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;

use super::error::ConfigError;
use super::ops::ContentsOps;
use super::registry::{BackendRegistry, MountContext};
use crate::config::MountConfig;

/// Information about a mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// Mount name (the segment after the virtual prefix).
    pub name: String,
    /// Full virtual path of the mount root, e.g. `datahub/space1`.
    pub path: String,
}

/// Backends keyed by mount name, in configuration order.
pub struct MountTable {
    mounts: IndexMap<String, Arc<dyn ContentsOps>>,
}

impl std::fmt::Debug for MountTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountTable")
            .field("mounts", &self.mounts.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::empty()
    }
}

impl MountTable {
    /// A table with no mounts.
    pub fn empty() -> Self {
        Self {
            mounts: IndexMap::new(),
        }
    }

    /// Build a table from mount configuration.
    ///
    /// Names are checked for duplicates before any backend is constructed.
    pub fn build(
        prefix: &str,
        configs: &[MountConfig],
        registry: &BackendRegistry,
    ) -> Result<Self, ConfigError> {
        check_unique(configs.iter().map(|s| s.name.as_str()))?;

        let mut mounts = IndexMap::with_capacity(configs.len());
        for config in configs {
            let ctx = MountContext {
                prefix: prefix.to_string(),
                mount: config.name.clone(),
            };
            let backend = registry.create(&config.backend, &ctx, &config.options)?;
            tracing::debug!(mount = %config.name, backend = %config.backend, "mounted backend");
            mounts.insert(config.name.clone(), backend);
        }
        Ok(Self { mounts })
    }

    /// Build a table from already constructed backends.
    pub fn from_backends<I, S>(backends: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (S, Arc<dyn ContentsOps>)>,
        S: Into<String>,
    {
        let backends: Vec<(String, Arc<dyn ContentsOps>)> = backends
            .into_iter()
            .map(|(name, backend)| (name.into(), backend))
            .collect();
        check_unique(backends.iter().map(|(name, _)| name.as_str()))?;
        Ok(Self {
            mounts: backends.into_iter().collect(),
        })
    }

    /// Look up a backend by mount name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ContentsOps>> {
        self.mounts.get(name)
    }

    /// Iterate mounts in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn ContentsOps>)> {
        self.mounts.iter().map(|(name, backend)| (name.as_str(), backend))
    }

    /// Mount names in configuration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.mounts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}

fn check_unique<'a>(names: impl Iterator<Item = &'a str>) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateMount(name.to_string()));
        }
    }
    Ok(())
}
