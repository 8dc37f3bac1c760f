//! # mixfs-kernel
//!
//! A contents router that presents one namespace over several storage
//! backends.
//!
//! Everything under the virtual prefix (`datahub` by default) is split
//! into mounts: `datahub/<mount>/<path>` is served by the backend mounted
//! as `<mount>` at `<path>`. All other paths go to a default backend.
//! The router implements the same [`ContentsOps`] trait as its backends.

pub mod config;
pub mod contents;

pub use config::{BackendConfig, MountConfig, RouterConfig};
pub use contents::{
    backends::{LocalBackend, MemoryBackend},
    BackendRegistry, Checkpoint, ConfigError, Content, ContentFormat, ContentsError,
    ContentsOps, ContentsResult, GetOptions, MixedContents, Model, ModelKind, MountTable,
    VirtualPath,
};
