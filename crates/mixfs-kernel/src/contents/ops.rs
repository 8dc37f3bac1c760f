//! Contents operations trait.
//!
//! This is the capability set every storage backend provides. The router
//! implements it as well, so a router can itself be mounted.

use async_trait::async_trait;

use super::types::{Checkpoint, GetOptions, Model};
use super::ContentsResult;

/// Core contents operations.
///
/// Paths are `/`-separated strings relative to the backend's own root;
/// the empty string is the root directory. Leading and trailing
/// separators are insignificant.
#[async_trait]
pub trait ContentsOps: Send + Sync {
    // ========================================================================
    // Queries
    // ========================================================================

    /// Does a directory exist at `path`?
    async fn dir_exists(&self, path: &str) -> ContentsResult<bool>;

    /// Does a regular file or notebook exist at `path`?
    async fn file_exists(&self, path: &str) -> ContentsResult<bool>;

    /// Is the entry at `path` hidden from listings?
    async fn is_hidden(&self, path: &str) -> ContentsResult<bool>;

    /// Fetch the model at `path`.
    async fn get(&self, path: &str, options: GetOptions) -> ContentsResult<Model>;

    /// Does anything exist at `path`?
    async fn exists(&self, path: &str) -> ContentsResult<bool> {
        Ok(self.file_exists(path).await? || self.dir_exists(path).await?)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Write `model` to `path`, creating or replacing it.
    ///
    /// Returns the saved model without content.
    async fn save(&self, model: Model, path: &str) -> ContentsResult<Model>;

    /// Apply `model` to the entry at `path`.
    ///
    /// When `model.path` differs from `path` this is a move.
    async fn update(&self, model: Model, path: &str) -> ContentsResult<Model> {
        if model.path.trim_matches('/') != path.trim_matches('/') {
            self.rename(path, &model.path).await?;
        }
        self.get(&model.path, GetOptions::metadata()).await
    }

    /// Delete the file or directory at `path`.
    async fn delete(&self, path: &str) -> ContentsResult<()>;

    /// Move the entry at `old_path` to `new_path`.
    async fn rename(&self, old_path: &str, new_path: &str) -> ContentsResult<()>;

    // ========================================================================
    // Checkpoints
    // ========================================================================

    /// Snapshot the current state of the file at `path`.
    async fn create_checkpoint(&self, path: &str) -> ContentsResult<Checkpoint>;

    /// List snapshots of the file at `path`.
    async fn list_checkpoints(&self, path: &str) -> ContentsResult<Vec<Checkpoint>>;

    /// Replace the file at `path` with the snapshot `checkpoint_id`.
    async fn restore_checkpoint(&self, checkpoint_id: &str, path: &str) -> ContentsResult<()>;

    /// Remove the snapshot `checkpoint_id` of the file at `path`.
    async fn delete_checkpoint(&self, checkpoint_id: &str, path: &str) -> ContentsResult<()>;
}
