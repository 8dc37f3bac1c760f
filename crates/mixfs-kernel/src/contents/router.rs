//! Mixed contents router.
//!
//! Presents one namespace over several backends. Paths of the form
//! `<prefix>/<mount>/<rest>` go to the backend mounted as `<mount>`, with
//! `<rest>` as the backend-local path; everything else goes to the
//! default backend.
//!
//! ```text
//! ""                        → default root + synthetic <prefix> entry
//! <prefix>                  → synthetic listing of all mounts
//! <prefix>/space1/a/b.txt   → space1.get("a/b.txt"), paths re-prefixed
//! notebooks/c.ipynb         → default.get("notebooks/c.ipynb")
//! ```

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use super::error::{ConfigError, ContentsError, ContentsResult};
use super::mount::{MountInfo, MountTable};
use super::ops::ContentsOps;
use super::path::{join, VirtualPath};
use super::rebase::Rebase;
use super::registry::{BackendRegistry, MountContext};
use super::types::{Checkpoint, Content, ContentFormat, GetOptions, Model};
use crate::config::RouterConfig;

/// Virtual prefix used when configuration does not set one.
pub const DEFAULT_VIRTUAL_PREFIX: &str = "datahub";

/// Routes contents operations to mounted backends.
pub struct MixedContents {
    prefix: String,
    mounts: MountTable,
    default: Arc<dyn ContentsOps>,
}

impl std::fmt::Debug for MixedContents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixedContents")
            .field("prefix", &self.prefix)
            .field("mounts", &self.mounts)
            .finish_non_exhaustive()
    }
}

impl MixedContents {
    /// Create a router over an already built mount table.
    pub fn new(prefix: impl Into<String>, mounts: MountTable, default: Arc<dyn ContentsOps>) -> Self {
        let prefix: String = prefix.into();
        Self {
            prefix: prefix.trim_matches('/').to_string(),
            mounts,
            default,
        }
    }

    /// Build a router from configuration, constructing every backend
    /// through `registry`.
    pub fn from_config(config: &RouterConfig, registry: &BackendRegistry) -> Result<Self, ConfigError> {
        config.validate()?;
        let mounts = MountTable::build(&config.virtual_prefix, &config.mounts, registry)?;
        let ctx = MountContext {
            prefix: config.virtual_prefix.clone(),
            mount: "default".to_string(),
        };
        let default = registry.create(&config.default.backend, &ctx, &config.default.options)?;
        tracing::info!(
            prefix = %config.virtual_prefix,
            mounts = ?mounts.names().collect::<Vec<_>>(),
            default = %config.default.backend,
            "contents router ready"
        );
        Ok(Self::new(config.virtual_prefix.clone(), mounts, default))
    }

    /// The virtual prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The mount table.
    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    /// List all mounts with their virtual paths.
    pub fn list_mounts(&self) -> Vec<MountInfo> {
        self.mounts
            .names()
            .map(|name| MountInfo {
                name: name.to_string(),
                path: join(&self.prefix, name),
            })
            .collect()
    }

    /// Find the backend owning a decomposed path.
    ///
    /// `None` unless `leading` is the prefix and a mount segment follows
    /// it that names a configured mount.
    pub fn resolve(&self, leading: &str, rest: &[String]) -> Option<&Arc<dyn ContentsOps>> {
        if leading != self.prefix {
            return None;
        }
        rest.first().and_then(|mount| self.mounts.get(mount))
    }

    /// Mount name owning `vp`, if any.
    fn mount_of<'a>(&self, vp: &'a VirtualPath) -> Option<&'a str> {
        self.resolve(&vp.leading, &vp.rest)
            .map(|_| vp.rest[0].as_str())
    }

    /// The namespace root or the bare prefix: both always exist as
    /// directories and never reach a backend.
    fn is_virtual_dir(&self, vp: &VirtualPath) -> bool {
        vp.is_root() || vp.is_bare(&self.prefix)
    }

    /// Run `op` on the backend owning `path`.
    ///
    /// Mounted backends get the mount-local path and their result is
    /// rebased into the virtual namespace. The default backend gets the
    /// normalized path and its result is returned as is.
    async fn dispatch<T, F, Fut>(&self, op: &'static str, path: &str, f: F) -> ContentsResult<T>
    where
        T: Rebase + Send,
        F: FnOnce(Arc<dyn ContentsOps>, String) -> Fut + Send,
        Fut: Future<Output = ContentsResult<T>> + Send,
    {
        let vp = VirtualPath::parse(path);
        match self.resolve(&vp.leading, &vp.rest) {
            Some(backend) => {
                let base = join(&self.prefix, &vp.rest[0]);
                let inner = vp.mount_relative();
                tracing::debug!(op, mount = %vp.rest[0], path = %inner, "dispatch to mount");
                let result = f(Arc::clone(backend), inner).await?;
                Ok(result.rebase(&base))
            }
            None => {
                tracing::debug!(op, path = %vp.normalized, "dispatch to default");
                f(Arc::clone(&self.default), vp.normalized).await
            }
        }
    }

    /// Synthesize the listing of the bare prefix: one entry per mount,
    /// built from each mount's own root.
    ///
    /// A mount whose root cannot be fetched is left out rather than
    /// failing the listing. With no entries the timestamps stay `None`.
    pub async fn aggregate_root(&self, options: GetOptions) -> Model {
        let mut entries = Vec::with_capacity(self.mounts.len());
        let mut stamps = Vec::with_capacity(self.mounts.len());

        for (name, backend) in self.mounts.iter() {
            match backend.get("", options.clone()).await {
                Ok(mut model) => {
                    model.content = None;
                    model.name = name.to_string();
                    model.path = join(&self.prefix, name);
                    if let Some(ts) = model.last_modified {
                        stamps.push(ts);
                    }
                    entries.push(model);
                }
                Err(e) => {
                    tracing::warn!(mount = name, error = %e, "omitting mount from root listing");
                }
            }
        }

        let mut root = Model::directory(self.prefix.as_str());
        root.format = Some(ContentFormat::Json);
        root.writable = false;
        root.last_modified = stamps.iter().max().copied();
        root.created = stamps.iter().min().copied();
        root.content = Some(Content::Directory(entries));
        root
    }

    /// The default backend's root, with the prefix listed as a directory.
    async fn root_with_prefix(&self, options: GetOptions) -> ContentsResult<Model> {
        let mut root = self.default.get("", options).await?;
        if let Some(children) = root.children_mut() {
            let mut entry = Model::directory(self.prefix.as_str());
            entry.writable = false;
            children.push(entry);
        }
        Ok(root)
    }
}

#[async_trait]
impl ContentsOps for MixedContents {
    async fn dir_exists(&self, path: &str) -> ContentsResult<bool> {
        if self.is_virtual_dir(&VirtualPath::parse(path)) {
            return Ok(true);
        }
        self.dispatch("dir_exists", path, |cm, p| async move { cm.dir_exists(&p).await })
            .await
    }

    async fn file_exists(&self, path: &str) -> ContentsResult<bool> {
        if self.is_virtual_dir(&VirtualPath::parse(path)) {
            return Ok(false);
        }
        self.dispatch("file_exists", path, |cm, p| async move { cm.file_exists(&p).await })
            .await
    }

    async fn is_hidden(&self, path: &str) -> ContentsResult<bool> {
        if self.is_virtual_dir(&VirtualPath::parse(path)) {
            return Ok(false);
        }
        self.dispatch("is_hidden", path, |cm, p| async move { cm.is_hidden(&p).await })
            .await
    }

    async fn exists(&self, path: &str) -> ContentsResult<bool> {
        if self.is_virtual_dir(&VirtualPath::parse(path)) {
            return Ok(true);
        }
        self.dispatch("exists", path, |cm, p| async move { cm.exists(&p).await })
            .await
    }

    async fn get(&self, path: &str, options: GetOptions) -> ContentsResult<Model> {
        let vp = VirtualPath::parse(path);
        if vp.is_bare(&self.prefix) {
            return Ok(self.aggregate_root(options).await);
        }
        if vp.is_root() {
            return self.root_with_prefix(options).await;
        }
        self.dispatch("get", path, move |cm, p| async move { cm.get(&p, options).await })
            .await
    }

    async fn save(&self, model: Model, path: &str) -> ContentsResult<Model> {
        self.dispatch("save", path, move |cm, p| async move { cm.save(model, &p).await })
            .await
    }

    /// Outside the prefix the default backend receives `model` unchanged
    /// and `path` normalized, and its result is not rebased.
    async fn update(&self, mut model: Model, path: &str) -> ContentsResult<Model> {
        let current = VirtualPath::parse(path);
        let target = VirtualPath::parse(&model.path);
        tracing::debug!(from = %current.normalized, to = %target.normalized, "update");

        let mount = self.mount_of(&current);
        if mount != self.mount_of(&target) {
            return Err(ContentsError::cross_mount(
                current.normalized.clone(),
                target.normalized.clone(),
            ));
        }

        match mount.and_then(|name| self.mounts.get(name).map(|b| (name, b))) {
            Some((name, backend)) => {
                let base = join(&self.prefix, name);
                model.path = target.mount_relative();
                let updated = backend.update(model, &current.mount_relative()).await?;
                Ok(updated.rebase(&base))
            }
            None => self.default.update(model, &current.normalized).await,
        }
    }

    async fn delete(&self, path: &str) -> ContentsResult<()> {
        self.dispatch("delete", path, |cm, p| async move { cm.delete(&p).await })
            .await
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> ContentsResult<()> {
        let old = VirtualPath::parse(old_path);
        let new = VirtualPath::parse(new_path);
        tracing::debug!(from = %old.normalized, to = %new.normalized, "rename");

        let mount = self.mount_of(&old);
        if mount != self.mount_of(&new) {
            return Err(ContentsError::cross_mount(
                old.normalized.clone(),
                new.normalized.clone(),
            ));
        }

        match mount.and_then(|name| self.mounts.get(name)) {
            Some(backend) => {
                backend
                    .rename(&old.mount_relative(), &new.mount_relative())
                    .await
            }
            None => self.default.rename(&old.normalized, &new.normalized).await,
        }
    }

    async fn create_checkpoint(&self, path: &str) -> ContentsResult<Checkpoint> {
        self.dispatch("create_checkpoint", path, |cm, p| async move {
            cm.create_checkpoint(&p).await
        })
        .await
    }

    async fn list_checkpoints(&self, path: &str) -> ContentsResult<Vec<Checkpoint>> {
        self.dispatch("list_checkpoints", path, |cm, p| async move {
            cm.list_checkpoints(&p).await
        })
        .await
    }

    async fn restore_checkpoint(&self, checkpoint_id: &str, path: &str) -> ContentsResult<()> {
        let id = checkpoint_id.to_string();
        self.dispatch("restore_checkpoint", path, move |cm, p| async move {
            cm.restore_checkpoint(&id, &p).await
        })
        .await
    }

    async fn delete_checkpoint(&self, checkpoint_id: &str, path: &str) -> ContentsResult<()> {
        let id = checkpoint_id.to_string();
        self.dispatch("delete_checkpoint", path, move |cm, p| async move {
            cm.delete_checkpoint(&id, &p).await
        })
        .await
    }
}
