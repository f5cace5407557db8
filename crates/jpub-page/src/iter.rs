//! Lazy page listing.

use std::collections::VecDeque;
use std::sync::Arc;

use jpub_storage::Storage;

use crate::error::PageError;
use crate::instance::PageInstance;
use crate::manager::PageManager;
use crate::path::from_resource_path;

/// Iterator over the pages under a directory, depth first.
///
/// Walks the storage with an explicit stack: the definitions of a directory
/// are yielded (sorted by the backend's listing order) before its
/// subdirectories are entered. Definitions or directories that disappear
/// between listing and loading are skipped. Other failures are yielded as
/// errors and iteration continues with the next entry.
pub struct PageIter<'a, S: Storage + ?Sized> {
    manager: &'a PageManager<S>,
    dirs: Vec<String>,
    definitions: VecDeque<String>,
}

impl<'a, S: Storage + ?Sized> PageIter<'a, S> {
    pub(crate) fn new(manager: &'a PageManager<S>, dir: &str) -> Self {
        Self {
            manager,
            dirs: vec![jpub_storage::normalize_path(dir)],
            definitions: VecDeque::new(),
        }
    }

    fn request_path(&self, definition_path: &str) -> String {
        let suffix = self.manager.suffix();
        if suffix.is_empty() {
            definition_path.to_owned()
        } else {
            format!("{definition_path}.{suffix}")
        }
    }

    /// List a directory into the pending queues. Returns an error for
    /// failures other than a vanished directory.
    fn expand(&mut self, dir: &str) -> Result<(), PageError> {
        let entries = match self.manager.storage().list(dir) {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => {
                tracing::debug!(dir, "Directory vanished while listing");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut subdirs = Vec::new();
        for entry in entries {
            if entry.is_dir {
                subdirs.push(entry.path);
            } else if let Some(definition_path) = from_resource_path(&entry.path) {
                self.definitions.push_back(definition_path);
            }
        }
        // Reversed so the first subdirectory is popped first
        self.dirs.extend(subdirs.into_iter().rev());
        Ok(())
    }
}

impl<S: Storage + ?Sized> Iterator for PageIter<'_, S> {
    type Item = Result<Arc<PageInstance>, PageError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(definition_path) = self.definitions.pop_front() {
                let request_path = self.request_path(&definition_path);
                match self.manager.existing_page(&request_path) {
                    Ok(page) => return Some(Ok(page)),
                    Err(PageError::NotFound(_)) => {
                        tracing::warn!(path = %definition_path, "Skipping page that vanished");
                    }
                    Err(e) => return Some(Err(e)),
                }
                continue;
            }

            let dir = self.dirs.pop()?;
            if let Err(e) = self.expand(&dir) {
                return Some(Err(e));
            }
        }
    }
}
