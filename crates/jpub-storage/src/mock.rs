//! Mock storage implementation for testing.
//!
//! Provides [`MockStorage`] for unit testing without filesystem access.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::storage::{
    Entry, Storage, StorageError, StorageErrorKind, StorageMut, join_path, normalize_path,
};

/// Backend identifier for error messages.
const BACKEND: &str = "mock";

#[derive(Clone, Debug)]
struct MockFile {
    content: Vec<u8>,
    mtime: f64,
}

/// In-memory storage for testing.
///
/// Stores files and their modification times in memory and counts reads per
/// path, which lets cache tests assert how many times a source was loaded.
///
/// # Example
///
/// ```ignore
/// use jpub_storage::{MockStorage, Storage};
///
/// let storage = MockStorage::new().with_file("/a.xml", "<page/>", 100.0);
///
/// let content = storage.read("/a.xml").unwrap();
/// assert_eq!(storage.read_count("/a.xml"), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockStorage {
    files: RwLock<BTreeMap<String, MockFile>>,
    dirs: RwLock<BTreeSet<String>>,
    reads: RwLock<HashMap<String, usize>>,
    total_reads: AtomicUsize,
    read_delay: Option<Duration>,
    read_only: bool,
}

impl MockStorage {
    /// Create a new empty mock storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file with content and modification time.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_file(self, path: &str, content: impl Into<Vec<u8>>, mtime: f64) -> Self {
        self.set_file(path, content, mtime);
        self
    }

    /// Add an empty directory.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_dir(self, path: &str) -> Self {
        self.dirs.write().unwrap().insert(normalize_path(path));
        self
    }

    /// Sleep for `delay` inside every `read`, to widen race windows in tests.
    #[must_use]
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Refuse all [`StorageMut`] operations with
    /// [`StorageErrorKind::Unsupported`].
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Create or replace a file with an explicit modification time.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set_file(&self, path: &str, content: impl Into<Vec<u8>>, mtime: f64) {
        self.files.write().unwrap().insert(
            normalize_path(path),
            MockFile {
                content: content.into(),
                mtime,
            },
        );
    }

    /// Change the modification time of an existing file without touching its
    /// content. Does nothing if the file doesn't exist.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn touch(&self, path: &str, mtime: f64) {
        if let Some(file) = self.files.write().unwrap().get_mut(&normalize_path(path)) {
            file.mtime = mtime;
        }
    }

    /// Delete a file, bypassing the read-only flag.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn delete(&self, path: &str) {
        self.files.write().unwrap().remove(&normalize_path(path));
    }

    /// Number of successful and failed `read` calls for a path.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn read_count(&self, path: &str) -> usize {
        self.reads
            .read()
            .unwrap()
            .get(&normalize_path(path))
            .copied()
            .unwrap_or(0)
    }

    /// Number of `read` calls across all paths.
    #[must_use]
    pub fn total_reads(&self) -> usize {
        self.total_reads.load(Ordering::SeqCst)
    }

    fn not_found(path: &str) -> StorageError {
        StorageError::not_found(path).with_backend(BACKEND)
    }

    fn check_writable(&self, path: &str) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::unsupported(path).with_backend(BACKEND));
        }
        Ok(())
    }

    fn is_dir(&self, dir: &str) -> bool {
        if dir == "/" {
            return true;
        }
        let prefix = format!("{dir}/");
        let dirs = self.dirs.read().unwrap();
        if dirs.contains(dir) || dirs.iter().any(|d| d.starts_with(&prefix)) {
            return true;
        }
        self.files
            .read()
            .unwrap()
            .keys()
            .any(|p| p.starts_with(&prefix))
    }

    fn next_mtime(&self) -> f64 {
        self.files
            .read()
            .unwrap()
            .values()
            .map(|f| f.mtime)
            .fold(0.0, f64::max)
            + 1.0
    }
}

/// First path segment of `path` below `dir`, if `path` lies under `dir`.
fn child_of<'a>(dir: &str, path: &'a str) -> Option<(&'a str, bool)> {
    let rest = if dir == "/" {
        path.strip_prefix('/')?
    } else {
        path.strip_prefix(dir)?.strip_prefix('/')?
    };
    match rest.split_once('/') {
        Some((first, _)) => Some((first, true)),
        None if rest.is_empty() => None,
        None => Some((rest, false)),
    }
}

impl Storage for MockStorage {
    fn exists(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.files.read().unwrap().contains_key(&path) || self.is_dir(&path)
    }

    fn mtime(&self, path: &str) -> Result<f64, StorageError> {
        self.files
            .read()
            .unwrap()
            .get(&normalize_path(path))
            .map(|f| f.mtime)
            .ok_or_else(|| Self::not_found(path))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let key = normalize_path(path);
        *self.reads.write().unwrap().entry(key.clone()).or_default() += 1;
        self.total_reads.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }

        self.files
            .read()
            .unwrap()
            .get(&key)
            .map(|f| f.content.clone())
            .ok_or_else(|| Self::not_found(path))
    }

    fn list(&self, dir: &str) -> Result<Vec<Entry>, StorageError> {
        let dir = normalize_path(dir);
        if !self.is_dir(&dir) {
            return Err(Self::not_found(&dir));
        }

        let mut children: BTreeMap<String, bool> = BTreeMap::new();
        let files = self.files.read().unwrap();
        let dirs = self.dirs.read().unwrap();
        let candidates = files.keys().chain(dirs.iter());
        for path in candidates {
            if let Some((name, nested)) = child_of(&dir, path) {
                let is_dir = nested || dirs.contains(path.as_str());
                let entry = children.entry(name.to_owned()).or_insert(is_dir);
                *entry |= is_dir;
            }
        }

        Ok(children
            .into_iter()
            .map(|(name, is_dir)| Entry {
                path: join_path(&dir, &name),
                is_dir,
            })
            .collect())
    }
}

impl StorageMut for MockStorage {
    fn write(&self, path: &str, content: &[u8]) -> Result<(), StorageError> {
        self.check_writable(path)?;
        let mtime = self.next_mtime();
        self.set_file(path, content.to_vec(), mtime);
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), StorageError> {
        self.check_writable(path)?;
        self.files
            .write()
            .unwrap()
            .remove(&normalize_path(path))
            .map(|_| ())
            .ok_or_else(|| Self::not_found(path))
    }

    fn create_dir(&self, path: &str) -> Result<(), StorageError> {
        self.check_writable(path)?;
        let path = normalize_path(path);
        if self.files.read().unwrap().contains_key(&path) {
            return Err(StorageError::new(StorageErrorKind::AlreadyExists)
                .with_path(path)
                .with_backend(BACKEND));
        }
        self.dirs.write().unwrap().insert(path);
        Ok(())
    }
}
