//! Router configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! virtual_prefix = "datahub"
//!
//! [default]
//! backend = "local"
//! options = { root = "~/notebooks" }
//!
//! [[mounts]]
//! name = "space1"
//! backend = "local"
//! options = { root = "/data/space1", read_only = true }
//!
//! [[mounts]]
//! name = "scratch"
//! backend = "memory"
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::contents::{ConfigError, DEFAULT_VIRTUAL_PREFIX};

/// A backend identifier plus the options applied to it after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Registry identifier, e.g. `"local"` or `"memory"`.
    pub backend: String,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl BackendConfig {
    /// A backend with no options.
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            options: Map::new(),
        }
    }

    /// Add an option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

impl Default for BackendConfig {
    /// The local backend serving the current directory.
    fn default() -> Self {
        Self::new("local").with_option("root", ".")
    }
}

/// One mount under the virtual prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountConfig {
    /// Segment after the virtual prefix that selects this backend.
    pub name: String,
    pub backend: String,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl MountConfig {
    /// A mount with no options.
    pub fn new(name: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend: backend.into(),
            options: Map::new(),
        }
    }

    /// Add an option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Top-level router configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_prefix")]
    pub virtual_prefix: String,
    #[serde(default)]
    pub default: BackendConfig,
    #[serde(default)]
    pub mounts: Vec<MountConfig>,
}

fn default_prefix() -> String {
    DEFAULT_VIRTUAL_PREFIX.to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            virtual_prefix: default_prefix(),
            default: BackendConfig::default(),
            mounts: Vec::new(),
        }
    }
}

impl RouterConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Check the prefix and mount names are single path segments.
    ///
    /// Duplicate mount names are reported when the mount table is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_segment(&self.virtual_prefix) {
            return Err(ConfigError::InvalidPrefix(self.virtual_prefix.clone()));
        }
        if let Some(bad) = self.mounts.iter().find(|m| !is_segment(&m.name)) {
            return Err(ConfigError::InvalidMountName(bad.name.clone()));
        }
        Ok(())
    }
}

fn is_segment(s: &str) -> bool {
    !s.is_empty() && !s.contains('/')
}
