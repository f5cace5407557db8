//! Storage traits and error types.
//!
//! Provides the read-side [`Storage`] trait, the write-side [`StorageMut`]
//! capability, and [`StorageError`] for unified error handling across backends.
//!
//! # Path Convention
//!
//! All path parameters are **store paths**, not host file paths:
//! - always `/`-separated, regardless of platform
//! - rooted at the backend root (`"/blog/post.xml"`; a missing leading
//!   slash is tolerated)
//! - `"/"` or `""` names the root directory
//!
//! Backends handle the mapping from store paths to their internal format
//! (a directory on disk, an in-memory map, a table of BLOBs).

use std::path::{Path, PathBuf};

/// A single entry returned by [`Storage::list`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Store path of the entry (e.g., "/blog/post.xml").
    pub path: String,
    /// True if the entry is a directory.
    pub is_dir: bool,
}

impl Entry {
    /// Create a file entry.
    #[must_use]
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
        }
    }

    /// Create a directory entry.
    #[must_use]
    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
        }
    }

    /// Final path segment.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// What went wrong, independent of the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageErrorKind {
    NotFound,
    PermissionDenied,
    /// A create found something already at the path.
    AlreadyExists,
    /// The path cannot name anything in this backend (e.g. escapes the root).
    InvalidPath,
    /// The backend cannot perform this operation, e.g. writes on a
    /// read-only store.
    Unsupported,
    Other,
}

impl StorageErrorKind {
    fn describe(self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::PermissionDenied => "permission denied",
            Self::AlreadyExists => "already exists",
            Self::InvalidPath => "invalid path",
            Self::Unsupported => "unsupported operation",
            Self::Other => "storage failure",
        }
    }
}

/// Failure of a storage operation.
///
/// Carries a [`StorageErrorKind`] for callers to branch on (caches only care
/// about [`is_not_found`](Self::is_not_found)) plus optional context: the
/// offending path, the backend name and the backend's own error.
#[derive(Debug)]
pub struct StorageError {
    kind: StorageErrorKind,
    path: Option<PathBuf>,
    backend: Option<&'static str>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageError {
    #[must_use]
    pub fn new(kind: StorageErrorKind) -> Self {
        Self {
            kind,
            path: None,
            backend: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Name the backend that failed, e.g. `"fs"`.
    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    #[must_use]
    pub fn kind(&self) -> StorageErrorKind {
        self.kind
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn backend(&self) -> Option<&'static str> {
        self.backend
    }

    /// True if the resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == StorageErrorKind::NotFound
    }

    /// Shorthand for a [`StorageErrorKind::NotFound`] error at `path`.
    #[must_use]
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::new(StorageErrorKind::NotFound).with_path(path)
    }

    /// Shorthand for a [`StorageErrorKind::Unsupported`] error at `path`.
    #[must_use]
    pub fn unsupported(path: impl Into<PathBuf>) -> Self {
        Self::new(StorageErrorKind::Unsupported).with_path(path)
    }

    /// Classify an I/O error, keeping it as the source.
    #[must_use]
    pub fn io(err: std::io::Error, path: Option<PathBuf>) -> Self {
        use std::io::ErrorKind as Io;

        let kind = match err.kind() {
            Io::NotFound => StorageErrorKind::NotFound,
            Io::PermissionDenied => StorageErrorKind::PermissionDenied,
            Io::AlreadyExists => StorageErrorKind::AlreadyExists,
            Io::InvalidFilename => StorageErrorKind::InvalidPath,
            Io::Unsupported => StorageErrorKind::Unsupported,
            _ => StorageErrorKind::Other,
        };
        let error = Self::new(kind).with_source(err);
        match path {
            Some(path) => error.with_path(path),
            None => error,
        }
    }
}

impl std::fmt::Display for StorageError {
    /// `fs: not found at /foo/bar: <source>`, omitting absent parts.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(backend) = self.backend {
            write!(f, "{backend}: ")?;
        }
        f.write_str(self.kind.describe())?;
        if let Some(path) = &self.path {
            write!(f, " at {}", path.display())?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let source = self.source.as_deref()?;
        Some(source)
    }
}

/// Read access to a page or template source.
///
/// Every backend (filesystem, in-memory, database) exposes the same four
/// operations. Caches built on top of a `Storage` use [`mtime`](Self::mtime)
/// as their only invalidation signal.
pub trait Storage: Send + Sync {
    /// Check if a file exists at the given store path.
    ///
    /// Returns `false` on errors (treats errors as "doesn't exist").
    fn exists(&self, path: &str) -> bool;

    /// Get modification time as seconds since Unix epoch.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] with kind [`StorageErrorKind::NotFound`] if the
    /// file doesn't exist, or another kind if it can't be stat'ed.
    fn mtime(&self, path: &str) -> Result<f64, StorageError>;

    /// Read the full content of a file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the file doesn't exist or can't be read.
    fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// List the direct children of a directory, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the directory doesn't exist or can't be read.
    fn list(&self, dir: &str) -> Result<Vec<Entry>, StorageError>;
}

/// Write access to a storage backend.
///
/// Separated from [`Storage`] so read-only backends cannot be handed to code
/// that needs to write: the capability is checked at compile time.
pub trait StorageMut: Storage {
    /// Create or replace a file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the file can't be written.
    fn write(&self, path: &str, content: &[u8]) -> Result<(), StorageError>;

    /// Remove a file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] with kind [`StorageErrorKind::NotFound`] if the
    /// file doesn't exist.
    fn remove(&self, path: &str) -> Result<(), StorageError>;

    /// Create a directory and all missing parents.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the directory can't be created.
    fn create_dir(&self, path: &str) -> Result<(), StorageError>;
}

/// Normalize a store path: forward slashes, single leading slash, no trailing
/// slash (except for the root, which is `"/"`).
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    format!("/{}", segments.join("/"))
}

/// Join a directory store path and a child name.
#[must_use]
pub fn join_path(dir: &str, name: &str) -> String {
    let dir = normalize_path(dir);
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}
