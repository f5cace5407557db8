//! Filesystem storage implementation for JPub.
//!
//! This crate provides [`FsStorage`], a filesystem-based implementation of the
//! [`Storage`](jpub_storage::Storage) and [`StorageMut`](jpub_storage::StorageMut)
//! traits. Store paths (`/blog/post.xml`) are resolved against a root
//! directory; paths that try to escape it with `..` are rejected.
//!
//! # Example
//!
//! ```ignore
//! use std::path::PathBuf;
//! use jpub_storage::Storage;
//! use jpub_storage_fs::FsStorage;
//!
//! let storage = FsStorage::new(PathBuf::from("pages"));
//! for entry in storage.list("/")? {
//!     println!("{} (dir: {})", entry.path, entry.is_dir);
//! }
//! ```

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use jpub_storage::{
    Entry, Storage, StorageError, StorageErrorKind, StorageMut, join_path, normalize_path,
};

/// Backend identifier for error messages.
const BACKEND: &str = "fs";

/// Filesystem storage implementation.
///
/// Every operation goes straight to the filesystem; there is no caching at
/// this layer. Callers that need to avoid re-reading unchanged files compare
/// [`Storage::mtime`] against a stored value.
#[derive(Debug, Clone)]
pub struct FsStorage {
    /// Root directory all store paths are resolved against.
    root: PathBuf,
}

impl FsStorage {
    /// Create a new filesystem storage rooted at `root`.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Root directory of this storage.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a store path to a host path under the root.
    ///
    /// Rejects paths containing parent directory components (`..`) to prevent
    /// path traversal (e.g., `/../../etc/passwd`).
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let normalized = normalize_path(path);
        let relative = Path::new(normalized.trim_start_matches('/'));

        let has_parent_dir = relative
            .components()
            .any(|c| matches!(c, Component::ParentDir));
        if has_parent_dir {
            return Err(StorageError::new(StorageErrorKind::InvalidPath)
                .with_path(path)
                .with_backend(BACKEND));
        }

        Ok(self.root.join(relative))
    }

    fn io_error(err: std::io::Error, path: &Path) -> StorageError {
        StorageError::io(err, Some(path.to_path_buf())).with_backend(BACKEND)
    }
}

impl Storage for FsStorage {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|p| p.exists())
    }

    fn mtime(&self, path: &str) -> Result<f64, StorageError> {
        let full_path = self.resolve(path)?;
        let metadata = fs::metadata(&full_path).map_err(|e| Self::io_error(e, &full_path))?;
        let modified = metadata
            .modified()
            .map_err(|e| Self::io_error(e, &full_path))?;
        Ok(modified
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64()))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full_path = self.resolve(path)?;
        fs::read(&full_path).map_err(|e| Self::io_error(e, &full_path))
    }

    fn list(&self, dir: &str) -> Result<Vec<Entry>, StorageError> {
        let full_path = self.resolve(dir)?;
        let entries = fs::read_dir(&full_path).map_err(|e| Self::io_error(e, &full_path))?;

        let mut result: Vec<Entry> = entries
            .filter_map(Result::ok)
            .map(|e| {
                let is_dir = e.file_type().is_ok_and(|t| t.is_dir());
                let name = e.file_name().to_string_lossy().into_owned();
                Entry {
                    path: join_path(dir, &name),
                    is_dir,
                }
            })
            .collect();
        result.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(result)
    }
}

impl StorageMut for FsStorage {
    fn write(&self, path: &str, content: &[u8]) -> Result<(), StorageError> {
        let full_path = self.resolve(path)?;
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Self::io_error(e, parent))?;
        }
        fs::write(&full_path, content).map_err(|e| Self::io_error(e, &full_path))?;
        tracing::debug!(path, bytes = content.len(), "Wrote file");
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), StorageError> {
        let full_path = self.resolve(path)?;
        fs::remove_file(&full_path).map_err(|e| Self::io_error(e, &full_path))?;
        tracing::debug!(path, "Removed file");
        Ok(())
    }

    fn create_dir(&self, path: &str) -> Result<(), StorageError> {
        let full_path = self.resolve(path)?;
        fs::create_dir_all(&full_path).map_err(|e| Self::io_error(e, &full_path))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    static_assertions::assert_impl_all!(FsStorage: Send, Sync);

    fn create_test_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn test_read_existing_file() {
        let temp_dir = create_test_dir();
        fs::write(temp_dir.path().join("a.xml"), "<page/>").unwrap();

        let storage = FsStorage::new(temp_dir.path().to_path_buf());

        assert_eq!(storage.read("/a.xml").unwrap(), b"<page/>".to_vec());
        assert_eq!(storage.read("a.xml").unwrap(), b"<page/>".to_vec());
    }

    #[test]
    fn test_read_nested_file() {
        let temp_dir = create_test_dir();
        fs::create_dir(temp_dir.path().join("blog")).unwrap();
        fs::write(temp_dir.path().join("blog/post.xml"), "<page/>").unwrap();

        let storage = FsStorage::new(temp_dir.path().to_path_buf());

        assert_eq!(storage.read("/blog/post.xml").unwrap(), b"<page/>".to_vec());
    }

    #[test]
    fn test_read_missing_file() {
        let temp_dir = create_test_dir();
        let storage = FsStorage::new(temp_dir.path().to_path_buf());

        let err = storage.read("/missing.xml").unwrap_err();

        assert_eq!(err.kind(), StorageErrorKind::NotFound);
        assert_eq!(err.backend(), Some("fs"));
        assert_eq!(err.path(), Some(temp_dir.path().join("missing.xml").as_path()));
    }

    #[test]
    fn test_read_directory_is_not_not_found() {
        let temp_dir = create_test_dir();
        fs::create_dir(temp_dir.path().join("blog")).unwrap();
        let storage = FsStorage::new(temp_dir.path().to_path_buf());

        let err = storage.read("/blog").unwrap_err();

        assert!(!err.is_not_found());
    }

    #[test]
    fn test_path_traversal_rejected() {
        let temp_dir = create_test_dir();
        let storage = FsStorage::new(temp_dir.path().to_path_buf());

        let err = storage.read("/../secret.xml").unwrap_err();

        assert_eq!(err.kind(), StorageErrorKind::InvalidPath);
        assert!(!storage.exists("/../secret.xml"));
        assert_eq!(
            storage.mtime("/blog/../../x").unwrap_err().kind(),
            StorageErrorKind::InvalidPath
        );
    }

    #[test]
    fn test_exists() {
        let temp_dir = create_test_dir();
        fs::write(temp_dir.path().join("a.xml"), "x").unwrap();
        let storage = FsStorage::new(temp_dir.path().to_path_buf());

        assert!(storage.exists("/a.xml"));
        assert!(storage.exists("/"));
        assert!(!storage.exists("/b.xml"));
    }

    #[test]
    fn test_mtime_existing_file() {
        let temp_dir = create_test_dir();
        fs::write(temp_dir.path().join("a.xml"), "x").unwrap();
        let storage = FsStorage::new(temp_dir.path().to_path_buf());

        let mtime = storage.mtime("/a.xml").unwrap();

        assert!(mtime > 0.0);
    }

    #[test]
    fn test_mtime_missing_file() {
        let temp_dir = create_test_dir();
        let storage = FsStorage::new(temp_dir.path().to_path_buf());

        assert!(storage.mtime("/missing.xml").unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_sorted_with_kinds() {
        let temp_dir = create_test_dir();
        fs::create_dir(temp_dir.path().join("blog")).unwrap();
        fs::write(temp_dir.path().join("index.xml"), "x").unwrap();
        fs::write(temp_dir.path().join("about.xml"), "x").unwrap();
        fs::write(temp_dir.path().join("blog/post.xml"), "x").unwrap();
        let storage = FsStorage::new(temp_dir.path().to_path_buf());

        assert_eq!(
            storage.list("/").unwrap(),
            vec![
                Entry::file("/about.xml"),
                Entry::dir("/blog"),
                Entry::file("/index.xml"),
            ]
        );
        assert_eq!(
            storage.list("/blog").unwrap(),
            vec![Entry::file("/blog/post.xml")]
        );
    }

    #[test]
    fn test_list_missing_dir() {
        let temp_dir = create_test_dir();
        let storage = FsStorage::new(temp_dir.path().to_path_buf());

        assert!(storage.list("/nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_write_creates_parents() {
        let temp_dir = create_test_dir();
        let storage = FsStorage::new(temp_dir.path().to_path_buf());

        storage.write("/blog/2024/post.xml", b"<page/>").unwrap();

        assert_eq!(
            fs::read_to_string(temp_dir.path().join("blog/2024/post.xml")).unwrap(),
            "<page/>"
        );
    }

    #[test]
    fn test_remove() {
        let temp_dir = create_test_dir();
        fs::write(temp_dir.path().join("a.xml"), "x").unwrap();
        let storage = FsStorage::new(temp_dir.path().to_path_buf());

        storage.remove("/a.xml").unwrap();

        assert!(!temp_dir.path().join("a.xml").exists());
        assert!(storage.remove("/a.xml").unwrap_err().is_not_found());
    }

    #[test]
    fn test_create_dir() {
        let temp_dir = create_test_dir();
        let storage = FsStorage::new(temp_dir.path().to_path_buf());

        storage.create_dir("/blog/2024").unwrap();

        assert!(temp_dir.path().join("blog/2024").is_dir());
    }
}
