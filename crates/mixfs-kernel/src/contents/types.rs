//! Core contents types.
//!
//! `Model` follows the notebook contents-API wire shape so it can be
//! serialized straight into an HTTP response by a host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of entry a model describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Notebook document (JSON content).
    Notebook,
}

impl ModelKind {
    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, ModelKind::Directory)
    }
}

/// Encoding of a model's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    Text,
    Base64,
    Json,
}

/// Model content.
///
/// Directories carry one level of child models; their own `content` is
/// normally absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Directory(Vec<Model>),
    Text(String),
    Notebook(serde_json::Value),
}

/// File or directory metadata plus optional content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Final path component.
    pub name: String,
    /// Path relative to the namespace root, without a leading `/`.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ModelKind,
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub format: Option<ContentFormat>,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub writable: bool,
}

impl Model {
    fn new(path: impl Into<String>, kind: ModelKind) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            name,
            path,
            kind,
            content: None,
            created: None,
            last_modified: None,
            format: None,
            mimetype: None,
            size: None,
            writable: true,
        }
    }

    /// Directory model with no content.
    pub fn directory(path: impl Into<String>) -> Self {
        Self::new(path, ModelKind::Directory)
    }

    /// Text file model.
    pub fn text_file(path: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut model = Self::new(path, ModelKind::File);
        model.size = Some(text.len() as u64);
        model.format = Some(ContentFormat::Text);
        model.mimetype = Some("text/plain".to_string());
        model.content = Some(Content::Text(text));
        model
    }

    /// Notebook model with JSON content.
    pub fn notebook(path: impl Into<String>, nb: serde_json::Value) -> Self {
        let mut model = Self::new(path, ModelKind::Notebook);
        model.format = Some(ContentFormat::Json);
        model.content = Some(Content::Notebook(nb));
        model
    }

    /// Set the last-modified timestamp.
    pub fn with_last_modified(mut self, ts: DateTime<Utc>) -> Self {
        self.last_modified = Some(ts);
        self
    }

    /// Set the content.
    pub fn with_content(mut self, content: Content) -> Self {
        self.content = Some(content);
        self
    }

    /// Returns true if this model describes a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Directory children, if this is a directory listing.
    pub fn children(&self) -> Option<&[Model]> {
        match &self.content {
            Some(Content::Directory(children)) => Some(children),
            _ => None,
        }
    }

    /// Mutable directory children, if this is a directory listing.
    pub fn children_mut(&mut self) -> Option<&mut Vec<Model>> {
        match &mut self.content {
            Some(Content::Directory(children)) => Some(children),
            _ => None,
        }
    }
}

/// A saved snapshot of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub last_modified: DateTime<Utc>,
}

/// Options for `get`, passed through to the owning backend unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOptions {
    /// Include content (file body or one level of directory children).
    pub content: bool,
    /// Expected kind, if the caller knows it.
    pub kind: Option<ModelKind>,
    /// Requested content format for files.
    pub format: Option<ContentFormat>,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            content: true,
            kind: None,
            format: None,
        }
    }
}

impl GetOptions {
    /// Metadata only.
    pub fn metadata() -> Self {
        Self {
            content: false,
            ..Default::default()
        }
    }

    /// Set the expected kind.
    pub fn with_kind(mut self, kind: ModelKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the requested format.
    pub fn with_format(mut self, format: ContentFormat) -> Self {
        self.format = Some(format);
        self
    }
}
