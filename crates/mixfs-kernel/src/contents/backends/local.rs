//! Local filesystem backend.
//!
//! Serves a directory on disk, with path security to prevent escaping
//! the root directory. Checkpoints are stored next to each file in a
//! `.checkpoints/` directory, one per file.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::contents::error::{ContentsError, ContentsResult};
use crate::contents::ops::ContentsOps;
use crate::contents::path::join;
use crate::contents::types::{Checkpoint, Content, ContentFormat, GetOptions, Model, ModelKind};

/// Directory holding per-file checkpoints.
const CHECKPOINT_DIR: &str = ".checkpoints";

/// The only checkpoint id this backend produces.
const CHECKPOINT_ID: &str = "checkpoint";

/// Options accepted by the `local` backend factory.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalOptions {
    /// Directory to serve. `~` is expanded.
    pub root: String,
    #[serde(default)]
    pub read_only: bool,
}

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/home/amy/notebooks`, then `get("src/a.ipynb")` reads
/// `/home/amy/notebooks/src/a.ipynb`.
///
/// Attempts to escape the root via `..` or symlinks are blocked.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    read_only: bool,
}

impl LocalBackend {
    /// Create a new backend rooted at the given path.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self {
            root,
            read_only: false,
        }
    }

    /// Create a read-only backend.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        let mut backend = Self::new(root);
        backend.read_only = true;
        backend
    }

    /// Build from factory options.
    pub fn from_options(options: LocalOptions) -> Self {
        let root = shellexpand::tilde(&options.root).into_owned();
        let mut backend = Self::new(root);
        backend.read_only = options.read_only;
        backend
    }

    /// Set whether this backend is read-only.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to an absolute path within the root.
    ///
    /// Returns an error if the path escapes the root.
    fn resolve(&self, path: &str) -> ContentsResult<PathBuf> {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Ok(self.root.clone());
        }

        let full = self.root.join(path);

        // Canonicalize the deepest existing ancestor so symlinks anywhere
        // along the path are followed; the missing tail is appended as is.
        let mut existing = full.as_path();
        let mut missing = Vec::new();
        // symlink_metadata so a dangling link counts as existing
        while existing.symlink_metadata().is_err() {
            let name = existing
                .components()
                .next_back()
                .ok_or_else(|| ContentsError::invalid_path(path))?
                .as_os_str();
            missing.push(name);
            existing = existing
                .parent()
                .ok_or_else(|| ContentsError::invalid_path(path))?;
        }
        // `..` after a missing component can't be resolved
        if missing.iter().any(|name| *name == "..") {
            return Err(ContentsError::path_escapes_root(path));
        }
        let mut canonical = dunce::canonicalize(existing)?;
        canonical.extend(missing.iter().rev());

        if !canonical.starts_with(&self.root) {
            return Err(ContentsError::path_escapes_root(format!(
                "{} is not under {}",
                canonical.display(),
                self.root.display()
            )));
        }

        Ok(canonical)
    }

    /// Resolve a path that may carry checkpoints. The root never does.
    fn resolve_checkpointed(&self, path: &str) -> ContentsResult<PathBuf> {
        if path.trim_matches('/').is_empty() {
            return Err(ContentsError::is_a_directory("/"));
        }
        self.resolve(path)
    }

    /// Check if write operations are allowed.
    fn check_writable(&self) -> ContentsResult<()> {
        if self.read_only {
            Err(ContentsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Metadata for `full`, mapping a missing entry to `NotFound(path)`.
    async fn metadata(full: &Path, path: &str) -> ContentsResult<std::fs::Metadata> {
        fs::metadata(full).await.map_err(|e| not_found_or_io(e, path))
    }

    fn checkpoint_file(full: &Path) -> ContentsResult<PathBuf> {
        let parent = full
            .parent()
            .ok_or_else(|| ContentsError::invalid_path("no parent"))?;
        let stem = full
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match full.extension() {
            Some(ext) => format!("{stem}-{CHECKPOINT_ID}.{}", ext.to_string_lossy()),
            None => format!("{stem}-{CHECKPOINT_ID}"),
        };
        Ok(parent.join(CHECKPOINT_DIR).join(name))
    }

    /// Build a model from disk, without content.
    fn base_model(&self, path: &str, meta: &std::fs::Metadata) -> Model {
        let mut model = if meta.is_dir() {
            Model::directory(path)
        } else if is_notebook(path) {
            let mut m = Model::notebook(path, serde_json::Value::Null);
            m.content = None;
            m
        } else {
            let mut m = Model::text_file(path, "");
            m.content = None;
            m.format = None;
            m.mimetype = None;
            m
        };
        let modified = meta.modified().ok().map(DateTime::<Utc>::from);
        model.last_modified = modified;
        model.created = meta.created().ok().map(DateTime::<Utc>::from).or(modified);
        model.size = if meta.is_dir() { None } else { Some(meta.len()) };
        model.writable = !self.read_only && !meta.permissions().readonly();
        model
    }

    async fn directory_model(&self, path: &str, full: &Path, meta: &std::fs::Metadata) -> ContentsResult<Model> {
        let mut model = self.base_model(path, meta);
        let mut children = Vec::new();
        let mut dir = fs::read_dir(full).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            // Broken symlinks and races with deletion are skipped.
            let Ok(child_meta) = fs::metadata(entry.path()).await else {
                continue;
            };
            children.push(self.base_model(&join(path, &name), &child_meta));
        }
        children.sort_by(|a, b| a.name.cmp(&b.name));
        model.format = Some(ContentFormat::Json);
        model.content = Some(Content::Directory(children));
        Ok(model)
    }

    async fn file_model(
        &self,
        path: &str,
        full: &Path,
        meta: &std::fs::Metadata,
        options: &GetOptions,
    ) -> ContentsResult<Model> {
        let mut model = self.base_model(path, meta);
        if options.kind == Some(ModelKind::File) {
            model.kind = ModelKind::File;
        }
        let bytes = fs::read(full).await?;

        if model.kind == ModelKind::Notebook {
            let nb: serde_json::Value = serde_json::from_slice(&bytes)
                .map_err(|e| ContentsError::invalid_model(format!("{path}: {e}")))?;
            model.format = Some(ContentFormat::Json);
            model.content = Some(Content::Notebook(nb));
            return Ok(model);
        }

        let text = match options.format {
            Some(ContentFormat::Base64) => None,
            _ => String::from_utf8(bytes.clone()).ok(),
        };
        match text {
            Some(text) => {
                model.format = Some(ContentFormat::Text);
                model.mimetype = Some("text/plain".to_string());
                model.content = Some(Content::Text(text));
            }
            None => {
                model.format = Some(ContentFormat::Base64);
                model.mimetype = Some("application/octet-stream".to_string());
                model.content = Some(Content::Text(BASE64.encode(&bytes)));
            }
        }
        Ok(model)
    }
}

fn is_notebook(path: &str) -> bool {
    path.ends_with(".ipynb")
}

fn not_found_or_io(e: io::Error, path: &str) -> ContentsError {
    if e.kind() == io::ErrorKind::NotFound {
        ContentsError::not_found(path)
    } else {
        ContentsError::Io(e)
    }
}

/// Serialize a model's content into file bytes.
fn encode_body(model: &Model) -> ContentsResult<Vec<u8>> {
    match (&model.content, model.format) {
        (None, _) => Err(ContentsError::invalid_model("no file content provided")),
        (Some(Content::Notebook(nb)), _) => serde_json::to_vec_pretty(nb)
            .map_err(|e| ContentsError::invalid_model(e.to_string())),
        (Some(Content::Text(b64)), Some(ContentFormat::Base64)) => BASE64
            .decode(b64)
            .map_err(|e| ContentsError::invalid_model(format!("bad base64 content: {e}"))),
        (Some(Content::Text(text)), _) => Ok(text.clone().into_bytes()),
        (Some(Content::Directory(_)), _) => {
            Err(ContentsError::invalid_model("directory listing given as file content"))
        }
    }
}

#[async_trait]
impl ContentsOps for LocalBackend {
    async fn dir_exists(&self, path: &str) -> ContentsResult<bool> {
        let full = self.resolve(path)?;
        match fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn file_exists(&self, path: &str) -> ContentsResult<bool> {
        let full = self.resolve(path)?;
        match fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_hidden(&self, path: &str) -> ContentsResult<bool> {
        Ok(path
            .trim_matches('/')
            .split('/')
            .any(|segment| segment.starts_with('.')))
    }

    async fn get(&self, path: &str, options: GetOptions) -> ContentsResult<Model> {
        let path = path.trim_matches('/');
        let full = self.resolve(path)?;
        let meta = Self::metadata(&full, path).await?;

        match (options.kind, meta.is_dir()) {
            (Some(ModelKind::Directory), false) => Err(ContentsError::not_a_directory(path)),
            (Some(ModelKind::File | ModelKind::Notebook), true) => {
                Err(ContentsError::is_a_directory(path))
            }
            (_, true) if options.content => self.directory_model(path, &full, &meta).await,
            (_, false) if options.content => self.file_model(path, &full, &meta, &options).await,
            _ => Ok(self.base_model(path, &meta)),
        }
    }

    async fn save(&self, model: Model, path: &str) -> ContentsResult<Model> {
        self.check_writable()?;
        let path = path.trim_matches('/');
        let full = self.resolve(path)?;

        if model.is_dir() {
            if full.is_file() {
                return Err(ContentsError::already_exists(path));
            }
            fs::create_dir_all(&full).await?;
        } else {
            if full.is_dir() {
                return Err(ContentsError::is_a_directory(path));
            }
            let body = encode_body(&model)?;
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&full, body).await?;
        }
        tracing::debug!(path, kind = ?model.kind, "saved");

        self.get(path, GetOptions::metadata()).await
    }

    async fn delete(&self, path: &str) -> ContentsResult<()> {
        self.check_writable()?;
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Err(ContentsError::invalid_path("cannot delete the root directory"));
        }
        let full = self.resolve(path)?;
        let meta = Self::metadata(&full, path).await?;

        if meta.is_dir() {
            let mut dir = fs::read_dir(&full).await?;
            while let Some(entry) = dir.next_entry().await? {
                if entry.file_name() != CHECKPOINT_DIR {
                    return Err(ContentsError::directory_not_empty(path));
                }
            }
            fs::remove_dir_all(&full).await?;
        } else {
            fs::remove_file(&full).await?;
            let checkpoint = Self::checkpoint_file(&full)?;
            if checkpoint.exists() {
                fs::remove_file(&checkpoint).await?;
            }
        }
        Ok(())
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> ContentsResult<()> {
        self.check_writable()?;
        let old_path = old_path.trim_matches('/');
        let new_path = new_path.trim_matches('/');
        if old_path == new_path {
            return Ok(());
        }
        let from = self.resolve(old_path)?;
        let to = self.resolve(new_path)?;

        if !from.exists() {
            return Err(ContentsError::not_found(old_path));
        }
        if to.exists() {
            return Err(ContentsError::already_exists(new_path));
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&from, &to).await?;

        // Files carry their checkpoint along.
        if to.is_file() {
            let old_checkpoint = Self::checkpoint_file(&from)?;
            if old_checkpoint.exists() {
                let new_checkpoint = Self::checkpoint_file(&to)?;
                if let Some(parent) = new_checkpoint.parent() {
                    fs::create_dir_all(parent).await?;
                }
                fs::rename(&old_checkpoint, &new_checkpoint).await?;
            }
        }
        Ok(())
    }

    async fn create_checkpoint(&self, path: &str) -> ContentsResult<Checkpoint> {
        self.check_writable()?;
        let path = path.trim_matches('/');
        let full = self.resolve(path)?;
        let meta = Self::metadata(&full, path).await?;
        if meta.is_dir() {
            return Err(ContentsError::is_a_directory(path));
        }

        let checkpoint = Self::checkpoint_file(&full)?;
        if let Some(parent) = checkpoint.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(&full, &checkpoint).await?;
        let modified = fs::metadata(&checkpoint).await?.modified()?;
        Ok(Checkpoint {
            id: CHECKPOINT_ID.to_string(),
            last_modified: modified.into(),
        })
    }

    async fn list_checkpoints(&self, path: &str) -> ContentsResult<Vec<Checkpoint>> {
        let full = self.resolve_checkpointed(path)?;
        let checkpoint = Self::checkpoint_file(&full)?;
        match fs::metadata(&checkpoint).await {
            Ok(meta) => Ok(vec![Checkpoint {
                id: CHECKPOINT_ID.to_string(),
                last_modified: meta.modified()?.into(),
            }]),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn restore_checkpoint(&self, checkpoint_id: &str, path: &str) -> ContentsResult<()> {
        self.check_writable()?;
        let path = path.trim_matches('/');
        let full = self.resolve_checkpointed(path)?;
        let checkpoint = Self::checkpoint_file(&full)?;
        if checkpoint_id != CHECKPOINT_ID || !checkpoint.exists() {
            return Err(ContentsError::checkpoint_not_found(checkpoint_id, path));
        }
        fs::copy(&checkpoint, &full).await?;
        Ok(())
    }

    async fn delete_checkpoint(&self, checkpoint_id: &str, path: &str) -> ContentsResult<()> {
        self.check_writable()?;
        let path = path.trim_matches('/');
        let full = self.resolve_checkpointed(path)?;
        let checkpoint = Self::checkpoint_file(&full)?;
        if checkpoint_id != CHECKPOINT_ID || !checkpoint.exists() {
            return Err(ContentsError::checkpoint_not_found(checkpoint_id, path));
        }
        fs::remove_file(&checkpoint).await?;
        Ok(())
    }
}
