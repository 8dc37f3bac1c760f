//! Contents error types.

use std::io;
use thiserror::Error;

/// Error returned by contents operations.
///
/// Backends raise whichever variant fits; the router passes them through
/// unchanged. `CrossMount` is the only variant the router produces itself.
#[derive(Debug, Error)]
pub enum ContentsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Backend is read-only.
    #[error("backend is read-only")]
    ReadOnly,

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Directory not empty.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Path escapes the backend root.
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Invalid path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Model is missing fields or has content of the wrong shape.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// No checkpoint with this id exists for the path.
    #[error("checkpoint {id} not found for {path}")]
    CheckpointNotFound { id: String, path: String },

    /// Rename or update between two different owners.
    #[error("cannot move across mount points: {from} -> {to}")]
    CrossMount { from: String, to: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ContentsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    /// Create a PathEscapesRoot error.
    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create an InvalidModel error.
    pub fn invalid_model(msg: impl Into<String>) -> Self {
        Self::InvalidModel(msg.into())
    }

    /// Create a CheckpointNotFound error.
    pub fn checkpoint_not_found(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self::CheckpointNotFound {
            id: id.into(),
            path: path.into(),
        }
    }

    /// Create a CrossMount error.
    pub fn cross_mount(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::CrossMount {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Returns true for errors that mean "nothing at this path".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) | Self::CheckpointNotFound { .. } => true,
            Self::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Convert ContentsError to std::io::Error for compatibility.
impl From<ContentsError> for io::Error {
    fn from(e: ContentsError) -> Self {
        match e {
            ContentsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            ContentsError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            ContentsError::PermissionDenied(msg) | ContentsError::PathEscapesRoot(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            ContentsError::ReadOnly => {
                io::Error::new(io::ErrorKind::PermissionDenied, "backend is read-only")
            }
            ContentsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            ContentsError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            ContentsError::DirectoryNotEmpty(msg) => {
                io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg)
            }
            ContentsError::InvalidPath(msg) | ContentsError::InvalidModel(msg) => {
                io::Error::new(io::ErrorKind::InvalidInput, msg)
            }
            e @ ContentsError::CheckpointNotFound { .. } => {
                io::Error::new(io::ErrorKind::NotFound, e.to_string())
            }
            e @ ContentsError::CrossMount { .. } => io::Error::other(e.to_string()),
            ContentsError::Io(e) => e,
            ContentsError::Other(msg) => io::Error::other(msg),
        }
    }
}

/// Contents result type.
pub type ContentsResult<T> = Result<T, ContentsError>;

/// Errors raised while building a router from configuration.
///
/// These abort construction; they never surface from a contents call.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Two mounts share a name.
    #[error("mount point {0:?} is configured more than once")]
    DuplicateMount(String),

    /// No factory registered under this backend identifier.
    #[error("unknown backend {backend:?} for mount {mount:?}")]
    UnknownBackend { mount: String, backend: String },

    /// A factory rejected its options.
    #[error("invalid options for mount {mount:?}: {reason}")]
    InvalidOptions { mount: String, reason: String },

    /// Mount names must be a single non-empty path segment.
    #[error("invalid mount name {0:?}")]
    InvalidMountName(String),

    /// The virtual prefix must be a single non-empty segment.
    #[error("invalid virtual prefix {0:?}")]
    InvalidPrefix(String),

    /// Reading the configuration file failed.
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
