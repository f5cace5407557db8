//! Storage abstraction for JPub page and template sources.
//!
//! This crate provides the [`Storage`] trait for reading page definitions and
//! templates from a backing store, and the [`StorageMut`] trait for backends
//! that can also be written to. This enables:
//!
//! - **Unit testing** without touching the real filesystem
//! - **Backend flexibility** (filesystem, in-memory, database BLOB columns)
//! - **Compile-time write capability**: code that needs to write asks for
//!   `StorageMut`, so read-only backends cannot be passed to it
//!
//! # Architecture
//!
//! The crate provides:
//! - [`Storage`] trait with `exists()`, `mtime()`, `read()`, and `list()`
//! - [`StorageMut`] trait with `write()`, `remove()`, and `create_dir()`
//! - [`MockStorage`] for testing (behind `mock` feature flag)
//!
//! The filesystem backend lives in the `jpub-storage-fs` crate.
//!
//! # Example
//!
//! ```ignore
//! use jpub_storage::Storage;
//! use jpub_storage_fs::FsStorage;
//!
//! let storage = FsStorage::new("pages".into());
//! let mtime = storage.mtime("/blog/post.xml")?;
//! let bytes = storage.read("/blog/post.xml")?;
//! ```

#[cfg(any(test, feature = "mock"))]
mod mock;
mod storage;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockStorage;
pub use storage::{
    Entry, Storage, StorageError, StorageErrorKind, StorageMut, join_path,
    normalize_path,
};
