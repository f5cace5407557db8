//! Page manager: request-path lookup, listing, and writes.

use std::sync::Arc;

use jpub_storage::{Storage, StorageMut, normalize_path};

use crate::action::ActionRegistry;
use crate::definition::PageDefinition;
use crate::definition_cache::{DefinitionCache, PageSettings, storage_error};
use crate::error::PageError;
use crate::instance::PageInstance;
use crate::iter::PageIter;
use crate::path::{to_definition_path, to_resource_path};

/// Entry point for resolving pages from a storage.
///
/// Read operations are available on every backend. Writes
/// ([`put_page`](Self::put_page), [`remove_page`](Self::remove_page),
/// [`make_directory`](Self::make_directory)) only exist when the storage
/// implements [`StorageMut`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use jpub_page::{ActionRegistry, PageManager, PageSettings};
/// use jpub_storage::MockStorage;
///
/// let storage = MockStorage::new().with_file("/a.xml", "<page><title>Hi</title></page>", 1.0);
/// let pages = PageManager::new(
///     Arc::new(storage),
///     Arc::new(ActionRegistry::new()),
///     PageSettings::default(),
/// );
///
/// let page = pages.page("/a.html").unwrap();
/// assert_eq!(page.title(), Some("Hi"));
/// assert_eq!(page.full_template_name(), "basic.html");
/// ```
pub struct PageManager<S: Storage + ?Sized = dyn Storage> {
    cache: DefinitionCache<S>,
    suffix: String,
}

impl<S: Storage + ?Sized> PageManager<S> {
    #[must_use]
    pub fn new(storage: Arc<S>, actions: Arc<ActionRegistry>, settings: PageSettings) -> Self {
        let cache = DefinitionCache::new(storage, actions, &settings);
        Self {
            cache,
            suffix: settings.suffix,
        }
    }

    /// Page instance for a request path, e.g. `/blog/post.html`.
    ///
    /// Falls back to the default page when no definition exists; the
    /// returned instance still carries the requested path. Fallback
    /// instances are built per request and never cached on the default
    /// definition.
    ///
    /// # Errors
    ///
    /// See [`DefinitionCache::get`] and [`PageDefinition::instance`].
    pub fn page(&self, request_path: &str) -> Result<Arc<PageInstance>, PageError> {
        let definition_path = normalize_path(&to_definition_path(request_path));
        let definition = self.cache.get(&definition_path)?;
        if definition.path() == definition_path {
            definition.instance(request_path)
        } else {
            definition.uncached_instance(request_path)
        }
    }

    /// Page instance for a request path, without default fallback.
    pub(crate) fn existing_page(
        &self,
        request_path: &str,
    ) -> Result<Arc<PageInstance>, PageError> {
        let definition = self.cache.lookup(&to_definition_path(request_path))?;
        definition.instance(request_path)
    }

    /// Page definition for a definition path, e.g. `/blog/post`.
    ///
    /// # Errors
    ///
    /// See [`DefinitionCache::get`].
    pub fn definition(&self, definition_path: &str) -> Result<Arc<PageDefinition>, PageError> {
        self.cache.get(definition_path)
    }

    /// Lazily iterate over every page under a directory.
    ///
    /// Each definition file yields the instance for its definition path plus
    /// the configured suffix.
    #[must_use]
    pub fn pages(&self, dir: &str) -> PageIter<'_, S> {
        PageIter::new(self, dir)
    }

    #[must_use]
    pub fn cache(&self) -> &DefinitionCache<S> {
        &self.cache
    }

    pub(crate) fn storage(&self) -> &S {
        self.cache.storage()
    }

    /// Page type used when listing pages.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

impl<S: StorageMut + ?Sized> PageManager<S> {
    /// Write a page definition and drop its cached entry.
    ///
    /// The content is parsed first, so a malformed definition is never
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::Parse`] for malformed content and
    /// [`PageError::Storage`] if the write fails.
    pub fn put_page(&self, definition_path: &str, content: &[u8]) -> Result<(), PageError> {
        let resource_path = to_resource_path(definition_path);
        jpub_xml::parse(content, &resource_path).map_err(|source| PageError::Parse {
            path: resource_path.clone(),
            source,
        })?;

        self.cache.storage().write(&resource_path, content)?;
        self.cache.invalidate(definition_path);
        tracing::info!(path = definition_path, "Stored page definition");
        Ok(())
    }

    /// Delete a page definition and drop its cached entry.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::NotFound`] if the definition does not exist and
    /// [`PageError::Storage`] if the removal fails.
    pub fn remove_page(&self, definition_path: &str) -> Result<(), PageError> {
        let resource_path = to_resource_path(definition_path);
        self.cache
            .storage()
            .remove(&resource_path)
            .map_err(|e| storage_error(definition_path, e))?;
        self.cache.invalidate(definition_path);
        tracing::info!(path = definition_path, "Removed page definition");
        Ok(())
    }

    /// Create a directory for page definitions, with any missing parents.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::Storage`] if the directory cannot be created.
    pub fn make_directory(&self, path: &str) -> Result<(), PageError> {
        self.cache.storage().create_dir(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use jpub_storage::{MockStorage, StorageErrorKind};
    use jpub_storage_fs::FsStorage;

    use super::*;

    static_assertions::assert_impl_all!(PageManager: Send, Sync);

    fn manager(
        storage: MockStorage,
        settings: PageSettings,
    ) -> (Arc<MockStorage>, PageManager<MockStorage>) {
        let storage = Arc::new(storage);
        let actions = Arc::new(ActionRegistry::new());
        let manager = PageManager::new(Arc::clone(&storage), actions, settings);
        (storage, manager)
    }

    #[test]
    fn test_page_shares_definition_across_suffixes() {
        let (storage, pages) = manager(
            MockStorage::new().with_file("/blog/post.xml", "<page><title>Post</title></page>", 1.0),
            PageSettings::default(),
        );

        let html = pages.page("/blog/post.html").unwrap();
        let json = pages.page("/blog/post.json").unwrap();

        assert_eq!(html.full_template_name(), "basic.html");
        assert_eq!(json.full_template_name(), "basic.json");
        assert_eq!(storage.read_count("/blog/post.xml"), 1);
        assert!(Arc::ptr_eq(&html, &pages.page("/blog/post.html").unwrap()));
    }

    #[test]
    fn test_hello_world_reload() {
        let (storage, pages) = manager(
            MockStorage::new().with_file("/a.xml", "<page><title>Hello</title></page>", 100.0),
            PageSettings::default(),
        );
        let hello = pages.page("/a.html").unwrap();
        assert_eq!(hello.title(), Some("Hello"));

        storage.set_file("/a.xml", "<page><title>World</title></page>", 200.0);
        let world = pages.page("/a.html").unwrap();

        assert_eq!(world.title(), Some("World"));
        assert!(!Arc::ptr_eq(&hello, &world));
    }

    #[test]
    fn test_default_page_keeps_request_path() {
        let settings = PageSettings {
            default_page: Some("/default".to_owned()),
            ..PageSettings::default()
        };
        let (_, pages) = manager(
            MockStorage::new().with_file("/default.xml", "<page><title>Not here</title></page>", 1.0),
            settings,
        );

        let page = pages.page("/missing").unwrap();

        assert_eq!(page.path(), "/missing");
        assert_eq!(page.definition_path(), "/default");
        assert_eq!(page.title(), Some("Not here"));
        assert!(matches!(
            pages.existing_page("/missing"),
            Err(PageError::NotFound(_))
        ));
    }

    #[test]
    fn test_fallback_requests_do_not_grow_default_instances() {
        let settings = PageSettings {
            default_page: Some("/default".to_owned()),
            ..PageSettings::default()
        };
        let (_, pages) = manager(
            MockStorage::new().with_file("/default.xml", "<page><title>Not here</title></page>", 1.0),
            settings,
        );

        for i in 0..1000 {
            let path = format!("/random-{i}.html");
            let page = pages.page(&path).unwrap();
            assert_eq!(page.path(), path);
        }

        let default = pages.definition("/default").unwrap();
        assert_eq!(default.instance_count(), 0);
        assert_eq!(pages.cache().paths(), vec!["/default"]);

        // Requests for the default page itself are still cached
        let page = pages.page("/default.html").unwrap();
        assert!(Arc::ptr_eq(&page, &pages.page("/default.html").unwrap()));
        assert_eq!(default.instance_count(), 1);
    }

    #[test]
    fn test_put_page_replaces_cached_definition() {
        let (storage, pages) = manager(
            MockStorage::new().with_file("/a.xml", "<page><title>Old</title></page>", 5.0),
            PageSettings::default(),
        );
        assert_eq!(pages.page("/a.html").unwrap().title(), Some("Old"));

        pages
            .put_page("/a", b"<page><title>New</title></page>")
            .unwrap();

        assert_eq!(pages.page("/a.html").unwrap().title(), Some("New"));
        assert_eq!(storage.read_count("/a.xml"), 2);
    }

    #[test]
    fn test_put_page_rejects_malformed() {
        let (storage, pages) = manager(MockStorage::new(), PageSettings::default());

        let err = pages.put_page("/a", b"<page>").unwrap_err();

        assert!(matches!(err, PageError::Parse { .. }));
        assert!(!storage.exists("/a.xml"));
    }

    #[test]
    fn test_put_page_read_only_backend() {
        let (_, pages) = manager(MockStorage::new().read_only(), PageSettings::default());

        let err = pages.put_page("/a", b"<page/>").unwrap_err();

        assert!(matches!(
            err,
            PageError::Storage(ref e) if e.kind() == StorageErrorKind::Unsupported
        ));
    }

    #[test]
    fn test_remove_page() {
        let (_, pages) = manager(
            MockStorage::new().with_file("/a.xml", "<page/>", 1.0),
            PageSettings::default(),
        );
        pages.page("/a.html").unwrap();

        pages.remove_page("/a").unwrap();

        assert!(pages.cache().is_empty());
        assert!(matches!(pages.page("/a.html"), Err(PageError::NotFound(_))));
        assert!(matches!(pages.remove_page("/a"), Err(PageError::NotFound(_))));
    }

    #[test]
    fn test_filesystem_backend() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FsStorage::new(temp_dir.path().to_path_buf()));
        let actions = Arc::new(ActionRegistry::new());
        let pages = PageManager::new(storage, actions, PageSettings::default());

        pages.make_directory("/blog").unwrap();
        pages
            .put_page("/blog/post", b"<page><title>On disk</title></page>")
            .unwrap();

        assert!(temp_dir.path().join("blog/post.xml").is_file());
        assert_eq!(pages.page("/blog/post.html").unwrap().title(), Some("On disk"));
    }

    #[test]
    fn test_dyn_storage() {
        let storage: Arc<dyn Storage> =
            Arc::new(MockStorage::new().with_file("/a.xml", "<page/>", 1.0));
        let actions = Arc::new(ActionRegistry::new());
        let pages: PageManager = PageManager::new(storage, actions, PageSettings::default());

        assert_eq!(pages.page("/a").unwrap().name(), "a");
    }
}
