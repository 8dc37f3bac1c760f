//! Contents routing.
//!
//! This module provides a notebook-style contents API over several
//! storage backends. Key components:
//!
//! - [`ContentsOps`] - Core trait for contents operations
//! - [`MixedContents`] - Routes operations to mounts under a virtual prefix
//! - [`MountTable`] - Named backends, fixed at construction
//! - [`MemoryBackend`] - In-memory tree (scratch mounts, testing)
//! - [`LocalBackend`] - Local directory (with path security)
//!
//! ## Design Decisions
//!
//! - **String paths**: Contents paths are `/`-separated API paths, not OS
//!   paths. Backends map them to their own storage.
//! - **One mount level**: Only the segment right after the prefix selects
//!   a backend; there is no longest-prefix matching.
//! - **Rebasing, not translating**: Backends answer in their own
//!   namespace; the router prefixes returned paths exactly once.

pub mod backends;
mod error;
mod mount;
mod ops;
mod path;
mod rebase;
mod registry;
mod router;
mod types;

pub use backends::{LocalBackend, MemoryBackend};
pub use error::{ConfigError, ContentsError, ContentsResult};
pub use mount::{MountInfo, MountTable};
pub use ops::ContentsOps;
pub use path::{join, VirtualPath};
pub use rebase::Rebase;
pub use registry::{parse_options, BackendFactory, BackendRegistry, MountContext};
pub use router::{MixedContents, DEFAULT_VIRTUAL_PREFIX};
pub use types::{Checkpoint, Content, ContentFormat, GetOptions, Model, ModelKind};
