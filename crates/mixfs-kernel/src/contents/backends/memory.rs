//! In-memory contents backend.
//!
//! Used for scratch mounts and testing. All data is ephemeral.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::contents::error::{ContentsError, ContentsResult};
use crate::contents::ops::ContentsOps;
use crate::contents::types::{Checkpoint, Content, ContentFormat, GetOptions, Model, ModelKind};

/// Options accepted by the `memory` backend factory. There are none.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryOptions {}

/// Entry in the memory tree.
#[derive(Debug, Clone)]
enum Entry {
    File {
        kind: ModelKind,
        content: Content,
        format: ContentFormat,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    },
    Directory {
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    },
}

impl Entry {
    fn directory() -> Self {
        let now = Utc::now();
        Entry::Directory {
            created: now,
            modified: now,
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self, Entry::Directory { .. })
    }

    fn modified_mut(&mut self) -> &mut DateTime<Utc> {
        match self {
            Entry::File { modified, .. } => modified,
            Entry::Directory { modified, .. } => modified,
        }
    }
}

#[derive(Debug, Default)]
struct Tree {
    /// Keyed by normalized path; `""` is the root.
    entries: BTreeMap<String, Entry>,
    /// Snapshots per file path, oldest first.
    checkpoints: HashMap<String, Vec<(Checkpoint, Entry)>>,
}

/// In-memory contents backend.
///
/// Thread-safe via internal `RwLock`. All data is lost when dropped.
#[derive(Debug)]
pub struct MemoryBackend {
    tree: RwLock<Tree>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty tree containing only the root directory.
    pub fn new() -> Self {
        let mut tree = Tree::default();
        tree.entries.insert(String::new(), Entry::directory());
        Self {
            tree: RwLock::new(tree),
        }
    }

    /// Set the last-modified time of an existing entry.
    pub fn touch(&self, path: &str, when: DateTime<Utc>) -> ContentsResult<()> {
        let path = normalize(path);
        let mut tree = self.write()?;
        let entry = tree
            .entries
            .get_mut(&path)
            .ok_or_else(|| ContentsError::not_found(&path))?;
        *entry.modified_mut() = when;
        Ok(())
    }

    fn read(&self) -> ContentsResult<std::sync::RwLockReadGuard<'_, Tree>> {
        self.tree
            .read()
            .map_err(|_| ContentsError::other("lock poisoned"))
    }

    fn write(&self) -> ContentsResult<std::sync::RwLockWriteGuard<'_, Tree>> {
        self.tree
            .write()
            .map_err(|_| ContentsError::other("lock poisoned"))
    }
}

/// Normalize a path: trim separators, drop empty and `.` segments,
/// resolve `..` without escaping the root.
fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

fn is_child(parent: &str, candidate: &str) -> bool {
    !candidate.is_empty() && candidate != parent && parent_of(candidate) == parent
}

fn is_descendant(ancestor: &str, candidate: &str) -> bool {
    if ancestor.is_empty() {
        return !candidate.is_empty();
    }
    candidate
        .strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('/'))
}

fn to_model(path: &str, entry: &Entry, with_content: bool) -> Model {
    match entry {
        Entry::Directory { created, modified } => {
            let mut model = Model::directory(path);
            model.created = Some(*created);
            model.last_modified = Some(*modified);
            model
        }
        Entry::File {
            kind,
            content,
            format,
            created,
            modified,
        } => {
            let mut model = match content {
                Content::Notebook(nb) => Model::notebook(path, nb.clone()),
                Content::Text(text) => Model::text_file(path, text.clone()),
                Content::Directory(_) => Model::directory(path),
            };
            model.kind = *kind;
            model.format = Some(*format);
            if *format == ContentFormat::Base64 {
                model.mimetype = Some("application/octet-stream".to_string());
            }
            model.created = Some(*created);
            model.last_modified = Some(*modified);
            if !with_content {
                model.content = None;
            }
            model
        }
    }
}

/// Validate a model's content for storage as a file.
fn file_body(model: &Model) -> ContentsResult<(ModelKind, Content, ContentFormat)> {
    match (&model.kind, &model.content) {
        (_, None) => Err(ContentsError::invalid_model("no file content provided")),
        (ModelKind::Notebook, Some(Content::Notebook(nb))) => Ok((
            ModelKind::Notebook,
            Content::Notebook(nb.clone()),
            ContentFormat::Json,
        )),
        (ModelKind::File, Some(Content::Text(text))) => {
            let format = match model.format {
                Some(ContentFormat::Base64) => ContentFormat::Base64,
                Some(ContentFormat::Text) | None => ContentFormat::Text,
                Some(ContentFormat::Json) => {
                    return Err(ContentsError::invalid_model("file format must be text or base64"));
                }
            };
            Ok((ModelKind::File, Content::Text(text.clone()), format))
        }
        (kind, Some(_)) => Err(ContentsError::invalid_model(format!(
            "content does not match model type {kind:?}"
        ))),
    }
}

#[async_trait]
impl ContentsOps for MemoryBackend {
    async fn dir_exists(&self, path: &str) -> ContentsResult<bool> {
        let tree = self.read()?;
        Ok(tree
            .entries
            .get(&normalize(path))
            .is_some_and(Entry::is_dir))
    }

    async fn file_exists(&self, path: &str) -> ContentsResult<bool> {
        let tree = self.read()?;
        Ok(tree
            .entries
            .get(&normalize(path))
            .is_some_and(|e| !e.is_dir()))
    }

    async fn is_hidden(&self, path: &str) -> ContentsResult<bool> {
        Ok(normalize(path).split('/').any(|s| s.starts_with('.')))
    }

    async fn get(&self, path: &str, options: GetOptions) -> ContentsResult<Model> {
        let path = normalize(path);
        let tree = self.read()?;
        let entry = tree
            .entries
            .get(&path)
            .ok_or_else(|| ContentsError::not_found(&path))?;

        match (options.kind, entry.is_dir()) {
            (Some(ModelKind::Directory), false) => {
                return Err(ContentsError::not_a_directory(&path));
            }
            (Some(ModelKind::File | ModelKind::Notebook), true) => {
                return Err(ContentsError::is_a_directory(&path));
            }
            _ => {}
        }

        let mut model = to_model(&path, entry, options.content);
        if entry.is_dir() && options.content {
            let children = tree
                .entries
                .iter()
                .filter(|(p, _)| is_child(&path, p))
                .map(|(p, e)| to_model(p, e, false))
                .collect();
            model.format = Some(ContentFormat::Json);
            model.content = Some(Content::Directory(children));
        }
        Ok(model)
    }

    async fn save(&self, model: Model, path: &str) -> ContentsResult<Model> {
        let path = normalize(path);
        if path.is_empty() && !model.is_dir() {
            return Err(ContentsError::is_a_directory("/"));
        }
        let now = Utc::now();
        {
            let mut tree = self.write()?;

            // every ancestor must be (or become) a directory
            let mut ancestor = String::new();
            for segment in parent_of(&path).split('/').filter(|s| !s.is_empty()) {
                if !ancestor.is_empty() {
                    ancestor.push('/');
                }
                ancestor.push_str(segment);
                match tree.entries.get(&ancestor) {
                    Some(e) if !e.is_dir() => {
                        return Err(ContentsError::not_a_directory(&ancestor));
                    }
                    Some(_) => {}
                    None => {
                        tree.entries.insert(ancestor.clone(), Entry::directory());
                    }
                }
            }

            let existing = tree.entries.get(&path);
            let entry = if model.is_dir() {
                match existing {
                    Some(e) if !e.is_dir() => return Err(ContentsError::already_exists(&path)),
                    Some(e) => e.clone(),
                    None => Entry::directory(),
                }
            } else {
                let created = match existing {
                    Some(e) if e.is_dir() => return Err(ContentsError::is_a_directory(&path)),
                    Some(Entry::File { created, .. }) => *created,
                    _ => now,
                };
                let (kind, content, format) = file_body(&model)?;
                Entry::File {
                    kind,
                    content,
                    format,
                    created,
                    modified: now,
                }
            };
            tree.entries.insert(path.clone(), entry);
            if let Some(parent) = tree.entries.get_mut(parent_of(&path)) {
                *parent.modified_mut() = now;
            }
        }
        self.get(&path, GetOptions::metadata()).await
    }

    async fn delete(&self, path: &str) -> ContentsResult<()> {
        let path = normalize(path);
        if path.is_empty() {
            return Err(ContentsError::invalid_path("cannot delete the root directory"));
        }
        let mut tree = self.write()?;
        let entry = tree
            .entries
            .get(&path)
            .ok_or_else(|| ContentsError::not_found(&path))?;
        if entry.is_dir() && tree.entries.keys().any(|p| is_descendant(&path, p)) {
            return Err(ContentsError::directory_not_empty(&path));
        }
        tree.entries.remove(&path);
        tree.checkpoints.remove(&path);
        if let Some(parent) = tree.entries.get_mut(parent_of(&path)) {
            *parent.modified_mut() = Utc::now();
        }
        Ok(())
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> ContentsResult<()> {
        let old_path = normalize(old_path);
        let new_path = normalize(new_path);
        if old_path.is_empty() || new_path.is_empty() {
            return Err(ContentsError::invalid_path("cannot rename the root directory"));
        }
        if old_path == new_path {
            return Ok(());
        }
        if is_descendant(&old_path, &new_path) {
            return Err(ContentsError::invalid_path(format!(
                "cannot move {old_path} into itself"
            )));
        }

        let mut tree = self.write()?;
        if !tree.entries.contains_key(&old_path) {
            return Err(ContentsError::not_found(&old_path));
        }
        if tree.entries.contains_key(&new_path) {
            return Err(ContentsError::already_exists(&new_path));
        }
        match tree.entries.get(parent_of(&new_path)) {
            Some(e) if e.is_dir() => {}
            Some(_) => return Err(ContentsError::not_a_directory(parent_of(&new_path))),
            None => return Err(ContentsError::not_found(parent_of(&new_path))),
        }

        let moved: Vec<String> = tree
            .entries
            .keys()
            .filter(|p| **p == old_path || is_descendant(&old_path, p))
            .cloned()
            .collect();
        for from in moved {
            let to = format!("{new_path}{}", &from[old_path.len()..]);
            if let Some(entry) = tree.entries.remove(&from) {
                tree.entries.insert(to.clone(), entry);
            }
            if let Some(snapshots) = tree.checkpoints.remove(&from) {
                tree.checkpoints.insert(to, snapshots);
            }
        }
        Ok(())
    }

    async fn create_checkpoint(&self, path: &str) -> ContentsResult<Checkpoint> {
        let path = normalize(path);
        let mut tree = self.write()?;
        let entry = match tree.entries.get(&path) {
            Some(e) if e.is_dir() => return Err(ContentsError::is_a_directory(&path)),
            Some(e) => e.clone(),
            None => return Err(ContentsError::not_found(&path)),
        };
        let checkpoint = Checkpoint {
            id: uuid::Uuid::new_v4().to_string(),
            last_modified: Utc::now(),
        };
        tree.checkpoints
            .entry(path)
            .or_default()
            .push((checkpoint.clone(), entry));
        Ok(checkpoint)
    }

    async fn list_checkpoints(&self, path: &str) -> ContentsResult<Vec<Checkpoint>> {
        let tree = self.read()?;
        Ok(tree
            .checkpoints
            .get(&normalize(path))
            .map(|snapshots| snapshots.iter().map(|(c, _)| c.clone()).collect())
            .unwrap_or_default())
    }

    async fn restore_checkpoint(&self, checkpoint_id: &str, path: &str) -> ContentsResult<()> {
        let path = normalize(path);
        let mut tree = self.write()?;
        let entry = tree
            .checkpoints
            .get(&path)
            .and_then(|snapshots| snapshots.iter().find(|(c, _)| c.id == checkpoint_id))
            .map(|(_, entry)| entry.clone())
            .ok_or_else(|| ContentsError::checkpoint_not_found(checkpoint_id, &path))?;
        tree.entries.insert(path, entry);
        Ok(())
    }

    async fn delete_checkpoint(&self, checkpoint_id: &str, path: &str) -> ContentsResult<()> {
        let path = normalize(path);
        let mut tree = self.write()?;
        let snapshots = tree
            .checkpoints
            .get_mut(&path)
            .ok_or_else(|| ContentsError::checkpoint_not_found(checkpoint_id, &path))?;
        let before = snapshots.len();
        snapshots.retain(|(c, _)| c.id != checkpoint_id);
        if snapshots.len() == before {
            return Err(ContentsError::checkpoint_not_found(checkpoint_id, &path));
        }
        Ok(())
    }
}
