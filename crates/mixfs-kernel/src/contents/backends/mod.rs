//! Contents backends.
//!
//! Backends implement [`ContentsOps`](crate::contents::ContentsOps) for
//! different storage types.

mod local;
mod memory;

pub use local::{LocalBackend, LocalOptions};
pub use memory::{MemoryBackend, MemoryOptions};
