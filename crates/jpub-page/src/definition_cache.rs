//! Cache of page definitions keyed by definition path.

use std::sync::Arc;

use jpub_storage::{Storage, StorageError, normalize_path};

use crate::action::ActionRegistry;
use crate::definition::PageDefinition;
use crate::error::PageError;
use crate::mtime_cache::{CacheEntry, MtimeCache};
use crate::path::to_resource_path;

/// Snapshot of a cached definition and the mtime of its source.
pub type DefinitionCacheEntry = CacheEntry<PageDefinition, f64>;

/// Settings shared by every page of a [`DefinitionCache`].
#[derive(Debug, Clone)]
pub struct PageSettings {
    /// Template used by pages without a `<template>` element.
    pub default_template: String,
    /// Definition path served when a requested definition does not exist.
    pub default_page: Option<String>,
    /// Page type used when listing pages (`html` lists `/a.html`).
    pub suffix: String,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            default_template: "basic".to_owned(),
            default_page: None,
            suffix: "html".to_owned(),
        }
    }
}

/// Path-keyed cache of [`PageDefinition`]s validated against source mtimes.
///
/// A definition is read from `<definition path>.xml` on first lookup and
/// reloaded in place whenever the file's mtime changes, which drops every
/// instance derived from the old configuration. When a source disappears its
/// entry is evicted. Parse failures are never cached.
///
/// Definition paths are normalized before use, so `a`, `/a` and `//a/` share
/// one entry.
pub struct DefinitionCache<S: Storage + ?Sized = dyn Storage> {
    storage: Arc<S>,
    actions: Arc<ActionRegistry>,
    default_template: String,
    default_page: Option<String>,
    entries: MtimeCache<PageDefinition, f64>,
}

impl<S: Storage + ?Sized> DefinitionCache<S> {
    /// Create an empty cache over a storage.
    #[must_use]
    pub fn new(storage: Arc<S>, actions: Arc<ActionRegistry>, settings: &PageSettings) -> Self {
        Self {
            storage,
            actions,
            default_template: settings.default_template.clone(),
            default_page: settings.default_page.as_deref().map(normalize_path),
            entries: MtimeCache::new(),
        }
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Definition path of the default page, if configured.
    #[must_use]
    pub fn default_page(&self) -> Option<&str> {
        self.default_page.as_deref()
    }

    /// Definition for a path, falling back to the default page.
    ///
    /// The default page is itself looked up through the cache, so it is
    /// validated against its own mtime like any other definition. The caller
    /// derives the instance for the original request path from the returned
    /// definition.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::NotFound`] with the requested path if neither the
    /// definition nor the default page exists, [`PageError::Parse`] if the
    /// source is malformed, and [`PageError::Storage`] for other storage
    /// failures.
    pub fn get(&self, definition_path: &str) -> Result<Arc<PageDefinition>, PageError> {
        let definition_path = normalize_path(definition_path);
        let definition_path = definition_path.as_str();
        let result = self.lookup(definition_path);
        let Some(default_page) = self.default_page.as_deref() else {
            return result;
        };

        match result {
            Err(PageError::NotFound(_)) if default_page != definition_path => {
                tracing::info!(path = definition_path, default_page, "Using default page");
                self.lookup(default_page).map_err(|e| match e {
                    PageError::NotFound(_) => PageError::NotFound(definition_path.to_owned()),
                    other => other,
                })
            }
            other => other,
        }
    }

    /// Definition for a path, without default fallback.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get), but a missing definition is always
    /// [`PageError::NotFound`].
    pub fn lookup(&self, definition_path: &str) -> Result<Arc<PageDefinition>, PageError> {
        let definition_path = normalize_path(definition_path);
        let definition_path = definition_path.as_str();
        let resource_path = to_resource_path(definition_path);

        self.entries.get_or_evict(
            definition_path,
            |e| matches!(e, PageError::NotFound(_)),
            || {
                self.storage
                    .mtime(&resource_path)
                    .map_err(|e| storage_error(definition_path, e))
            },
            |previous| {
                let bytes = self
                    .storage
                    .read(&resource_path)
                    .map_err(|e| storage_error(definition_path, e))?;
                let configuration =
                    jpub_xml::parse(&bytes, &resource_path).map_err(|source| {
                        PageError::Parse {
                            path: resource_path.clone(),
                            source,
                        }
                    })?;

                if let Some(definition) = previous {
                    tracing::info!(path = definition_path, "Reloading page definition");
                    definition.load_configuration(configuration);
                    return Ok(Arc::clone(definition));
                }
                Ok(Arc::new(PageDefinition::new(
                    definition_path,
                    configuration,
                    Arc::clone(&self.actions),
                    self.default_template.as_str(),
                )))
            },
        )
    }

    /// Current cache entry for a definition path, without validating it.
    #[must_use]
    pub fn entry(&self, definition_path: &str) -> Option<Arc<DefinitionCacheEntry>> {
        self.entries.entry(&normalize_path(definition_path))
    }

    /// Drop the entry for a definition path. Returns whether one was cached.
    pub fn invalidate(&self, definition_path: &str) -> bool {
        self.entries.remove(&normalize_path(definition_path))
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Cached definition paths, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.entries.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Map a storage failure for a definition to a page error.
pub(crate) fn storage_error(definition_path: &str, err: StorageError) -> PageError {
    if err.is_not_found() {
        PageError::NotFound(definition_path.to_owned())
    } else {
        PageError::Storage(err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use jpub_storage::{Entry, MockStorage, StorageErrorKind};
    use pretty_assertions::assert_eq;

    use super::*;

    static_assertions::assert_impl_all!(DefinitionCache: Send, Sync);
    static_assertions::assert_impl_all!(DefinitionCache<MockStorage>: Send, Sync);

    fn cache(storage: MockStorage) -> (Arc<MockStorage>, DefinitionCache<MockStorage>) {
        cache_with(storage, &PageSettings::default())
    }

    fn cache_with(
        storage: MockStorage,
        settings: &PageSettings,
    ) -> (Arc<MockStorage>, DefinitionCache<MockStorage>) {
        let storage = Arc::new(storage);
        let cache = DefinitionCache::new(
            Arc::clone(&storage),
            Arc::new(ActionRegistry::new()),
            settings,
        );
        (storage, cache)
    }

    fn title(definition: &PageDefinition) -> Option<String> {
        definition
            .configuration()
            .child_value("title")
            .map(str::to_owned)
    }

    #[test]
    fn test_get_unchanged_returns_same_definition() {
        let (storage, cache) =
            cache(MockStorage::new().with_file("/a.xml", "<page><title>A</title></page>", 1.0));

        let first = cache.get("/a").unwrap();
        let second = cache.get("/a").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(storage.read_count("/a.xml"), 1);
        assert_eq!(cache.paths(), vec!["/a"]);
    }

    #[test]
    fn test_equivalent_paths_share_definition() {
        let (storage, cache) = cache(MockStorage::new().with_file("/blog/a.xml", "<page/>", 1.0));

        let rooted = cache.get("/blog/a").unwrap();
        let relative = cache.get("blog/a").unwrap();
        let untidy = cache.lookup("//blog/./a/").unwrap();

        assert!(Arc::ptr_eq(&rooted, &relative));
        assert!(Arc::ptr_eq(&rooted, &untidy));
        assert_eq!(rooted.path(), "/blog/a");
        assert_eq!(storage.read_count("/blog/a.xml"), 1);
        assert_eq!(cache.paths(), vec!["/blog/a"]);
        assert!(cache.entry("blog/a").is_some());

        assert!(cache.invalidate("blog/a"));
        assert!(cache.is_empty());
    }

    #[allow(clippy::float_cmp)]
    #[test]
    fn test_mtime_change_reloads_in_place() {
        let (storage, cache) =
            cache(MockStorage::new().with_file("/a.xml", "<page><title>Hello</title></page>", 100.0));
        let definition = cache.get("/a").unwrap();
        let instance = definition.instance("/a.html").unwrap();
        assert_eq!(title(&definition).as_deref(), Some("Hello"));

        storage.set_file("/a.xml", "<page><title>World</title></page>", 200.0);
        let reloaded = cache.get("/a").unwrap();

        assert!(Arc::ptr_eq(&definition, &reloaded));
        assert_eq!(title(&reloaded).as_deref(), Some("World"));
        let fresh = reloaded.instance("/a.html").unwrap();
        assert!(!Arc::ptr_eq(&instance, &fresh));
        assert_eq!(fresh.title(), Some("World"));
        assert_eq!(*cache.entry("/a").unwrap().stamp(), 200.0);
    }

    #[test]
    fn test_missing_without_default() {
        let (_, cache) = cache(MockStorage::new());

        let err = cache.get("/missing").unwrap_err();

        assert!(matches!(err, PageError::NotFound(ref p) if p == "/missing"));
    }

    #[test]
    fn test_missing_falls_back_to_default() {
        let settings = PageSettings {
            default_page: Some("/default".to_owned()),
            ..PageSettings::default()
        };
        let (_, cache) = cache_with(
            MockStorage::new().with_file("/default.xml", "<page><title>Default</title></page>", 1.0),
            &settings,
        );

        let definition = cache.get("/missing").unwrap();

        assert_eq!(definition.path(), "/default");
        assert_eq!(title(&definition).as_deref(), Some("Default"));
        assert!(Arc::ptr_eq(&definition, &cache.get("/default").unwrap()));
        assert!(cache.lookup("/missing").is_err());
    }

    #[test]
    fn test_missing_default_reports_requested_path() {
        let settings = PageSettings {
            default_page: Some("/default".to_owned()),
            ..PageSettings::default()
        };
        let (_, cache) = cache_with(MockStorage::new(), &settings);

        let err = cache.get("/missing").unwrap_err();

        assert!(matches!(err, PageError::NotFound(ref p) if p == "/missing"));
    }

    #[test]
    fn test_deleted_source_is_evicted() {
        let (storage, cache) = cache(MockStorage::new().with_file("/a.xml", "<page/>", 1.0));
        cache.get("/a").unwrap();
        assert_eq!(cache.len(), 1);

        storage.delete("/a.xml");

        assert!(matches!(cache.get("/a"), Err(PageError::NotFound(_))));
        assert!(cache.is_empty());
        assert!(cache.entry("/a").is_none());
    }

    #[test]
    fn test_parse_error_not_cached() {
        let (storage, cache) = cache(MockStorage::new().with_file("/a.xml", "<page><title>", 1.0));

        let err = cache.get("/a").unwrap_err();
        assert!(matches!(err, PageError::Parse { ref path, .. } if path == "/a.xml"));
        assert!(cache.entry("/a").is_none());

        // Same mtime: still retried, since failures are not stored
        assert!(cache.get("/a").is_err());
        assert_eq!(storage.read_count("/a.xml"), 2);

        storage.set_file("/a.xml", "<page><title>Fixed</title></page>", 2.0);
        let definition = cache.get("/a").unwrap();
        assert_eq!(title(&definition).as_deref(), Some("Fixed"));
    }

    #[allow(clippy::float_cmp)]
    #[test]
    fn test_parse_error_keeps_previous_entry() {
        let (storage, cache) =
            cache(MockStorage::new().with_file("/a.xml", "<page><title>Good</title></page>", 1.0));
        let definition = cache.get("/a").unwrap();

        storage.set_file("/a.xml", "<page>", 2.0);

        assert!(matches!(cache.get("/a"), Err(PageError::Parse { .. })));
        assert_eq!(title(&definition).as_deref(), Some("Good"));
        assert_eq!(*cache.entry("/a").unwrap().stamp(), 1.0);
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let (storage, cache) = cache(MockStorage::new().with_file("/a.xml", "<page/>", 1.0));
        let first = cache.get("/a").unwrap();

        assert!(cache.invalidate("/a"));
        let second = cache.get("/a").unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(storage.read_count("/a.xml"), 2);
    }

    #[test]
    fn test_concurrent_cold_gets_read_once() {
        let (storage, cache) = cache(
            MockStorage::new()
                .with_file("/a.xml", "<page><title>A</title></page>", 1.0)
                .with_read_delay(Duration::from_millis(20)),
        );
        let threads = 8;
        let barrier = Barrier::new(threads);

        let definitions: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache.get("/a").unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(storage.read_count("/a.xml"), 1);
        assert!(definitions.iter().all(|d| Arc::ptr_eq(d, &definitions[0])));
    }

    #[test]
    fn test_different_keys_load_independently() {
        let (storage, cache) = cache(
            MockStorage::new()
                .with_file("/a.xml", "<page/>", 1.0)
                .with_file("/b.xml", "<page/>", 1.0)
                .with_read_delay(Duration::from_millis(10)),
        );

        thread::scope(|s| {
            s.spawn(|| cache.get("/a").unwrap());
            s.spawn(|| cache.get("/b").unwrap());
        });

        assert_eq!(storage.total_reads(), 2);
        assert_eq!(cache.len(), 2);
    }

    /// Storage that refuses every access.
    struct DeniedStorage;

    impl Storage for DeniedStorage {
        fn exists(&self, _path: &str) -> bool {
            true
        }

        fn mtime(&self, path: &str) -> Result<f64, StorageError> {
            Err(StorageError::new(StorageErrorKind::PermissionDenied).with_path(path))
        }

        fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
            Err(StorageError::new(StorageErrorKind::PermissionDenied).with_path(path))
        }

        fn list(&self, dir: &str) -> Result<Vec<Entry>, StorageError> {
            Err(StorageError::new(StorageErrorKind::PermissionDenied).with_path(dir))
        }
    }

    #[test]
    fn test_storage_failure_is_not_fallback() {
        let settings = PageSettings {
            default_page: Some("/default".to_owned()),
            ..PageSettings::default()
        };
        let cache = DefinitionCache::new(
            Arc::new(DeniedStorage),
            Arc::new(ActionRegistry::new()),
            &settings,
        );

        let err = cache.get("/a").unwrap_err();

        assert!(matches!(err, PageError::Storage(ref e) if e.kind() == StorageErrorKind::PermissionDenied));
    }
}
