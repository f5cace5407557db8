//! Templates and their cache.
//!
//! A template is a text file such as `/basic.html`, optionally paired with a
//! sibling configuration file with the same base name (`/basic.xml`). Both
//! files are part of the cache stamp, so editing, adding, or removing the
//! configuration invalidates the template just like editing its text.

use std::sync::Arc;

use jpub_storage::{Storage, StorageError, StorageMut, normalize_path};
use jpub_xml::Configuration;

use crate::error::TemplateError;
use crate::mtime_cache::{CacheEntry, MtimeCache};
use crate::path::{DEFINITION_SUFFIX, to_definition_path, to_page_type, to_resource_path};

/// Cache stamp of a template: its own mtime and its configuration's, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateStamp {
    pub template: f64,
    pub config: Option<f64>,
}

/// Snapshot of a cached template and the stamp it was loaded at.
pub type TemplateCacheEntry = CacheEntry<Template, TemplateStamp>;

/// Template text with its optional configuration.
#[derive(Debug)]
pub struct Template {
    path: String,
    text: String,
    configuration: Option<Configuration>,
}

impl Template {
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        text: impl Into<String>,
        configuration: Option<Configuration>,
    ) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            configuration,
        }
    }

    /// Store path, e.g. `/basic.html`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_ref()
    }

    /// Value of a `<property name="...">` in the configuration.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&str> {
        self.configuration
            .as_ref()?
            .children_named("property")
            .find(|p| p.attribute("name") == Some(name))
            .map(Configuration::value)
    }
}

/// Path of the sibling configuration of a template.
///
/// `None` for templates that are themselves `.xml` files, which would
/// otherwise be their own configuration.
#[must_use]
pub fn config_path(template_path: &str) -> Option<String> {
    if to_page_type(template_path).as_deref() == Some(DEFINITION_SUFFIX) {
        return None;
    }
    Some(to_resource_path(&to_definition_path(template_path)))
}

/// Path-keyed cache of [`Template`]s validated against source mtimes.
///
/// Templates have no default fallback.
pub struct TemplateCache<S: Storage + ?Sized = dyn Storage> {
    storage: Arc<S>,
    entries: MtimeCache<Template, TemplateStamp>,
}

impl<S: Storage + ?Sized> TemplateCache<S> {
    #[must_use]
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            entries: MtimeCache::new(),
        }
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Template at a store path, loading it if absent or stale.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::NotFound`] if the template does not exist,
    /// [`TemplateError::Parse`] if its configuration is malformed,
    /// [`TemplateError::Encoding`] if its text is not UTF-8, and
    /// [`TemplateError::Storage`] for other storage failures.
    pub fn get(&self, template_path: &str) -> Result<Arc<Template>, TemplateError> {
        let template_path = normalize_path(template_path);
        let config_path = config_path(&template_path);

        self.entries.get_or_evict(
            &template_path,
            |e| matches!(e, TemplateError::NotFound(_)),
            || self.stamp(&template_path, config_path.as_deref()),
            |_| self.load(&template_path, config_path.as_deref()).map(Arc::new),
        )
    }

    fn stamp(
        &self,
        template_path: &str,
        config_path: Option<&str>,
    ) -> Result<TemplateStamp, TemplateError> {
        let template = self
            .storage
            .mtime(template_path)
            .map_err(|e| storage_error(template_path, e))?;
        let config = match config_path {
            Some(path) => match self.storage.mtime(path) {
                Ok(mtime) => Some(mtime),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e.into()),
            },
            None => None,
        };
        Ok(TemplateStamp { template, config })
    }

    fn load(
        &self,
        template_path: &str,
        config_path: Option<&str>,
    ) -> Result<Template, TemplateError> {
        let bytes = self
            .storage
            .read(template_path)
            .map_err(|e| storage_error(template_path, e))?;
        let text = String::from_utf8(bytes).map_err(|source| TemplateError::Encoding {
            path: template_path.to_owned(),
            source,
        })?;

        let configuration = match config_path {
            Some(path) => match self.storage.read(path) {
                Ok(bytes) => Some(jpub_xml::parse(&bytes, path).map_err(|source| {
                    TemplateError::Parse {
                        path: path.to_owned(),
                        source,
                    }
                })?),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        tracing::debug!(
            path = template_path,
            configured = configuration.is_some(),
            "Loaded template"
        );
        Ok(Template::new(template_path, text, configuration))
    }

    /// Current cache entry for a template path, without validating it.
    #[must_use]
    pub fn entry(&self, template_path: &str) -> Option<Arc<TemplateCacheEntry>> {
        self.entries.entry(&normalize_path(template_path))
    }

    /// Drop the entry for a template path. Returns whether one was cached.
    pub fn invalidate(&self, template_path: &str) -> bool {
        self.entries.remove(&normalize_path(template_path))
    }

    pub fn clear(&self) {
        self.entries.clear();
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

fn storage_error(template_path: &str, err: StorageError) -> TemplateError {
    if err.is_not_found() {
        TemplateError::NotFound(template_path.to_owned())
    } else {
        TemplateError::Storage(err)
    }
}

/// Resolves full template names (`basic.html`) to cached templates.
pub struct TemplateManager<S: Storage + ?Sized = dyn Storage> {
    cache: TemplateCache<S>,
}

impl<S: Storage + ?Sized> TemplateManager<S> {
    #[must_use]
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            cache: TemplateCache::new(storage),
        }
    }

    /// Template for a full template name, e.g. `basic.html` or `blog/post.json`.
    ///
    /// # Errors
    ///
    /// See [`TemplateCache::get`].
    pub fn template(&self, full_name: &str) -> Result<Arc<Template>, TemplateError> {
        self.cache.get(&normalize_path(full_name))
    }

    #[must_use]
    pub fn cache(&self) -> &TemplateCache<S> {
        &self.cache
    }
}

impl<S: StorageMut + ?Sized> TemplateManager<S> {
    /// Write template text and drop its cached entry.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Storage`] if the write fails.
    pub fn put_template(&self, full_name: &str, text: &str) -> Result<(), TemplateError> {
        let path = normalize_path(full_name);
        self.cache.storage().write(&path, text.as_bytes())?;
        self.cache.invalidate(&path);
        tracing::info!(path = %path, "Stored template");
        Ok(())
    }

    /// Delete a template and drop its cached entry.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::NotFound`] if the template does not exist and
    /// [`TemplateError::Storage`] if the removal fails.
    pub fn remove_template(&self, full_name: &str) -> Result<(), TemplateError> {
        let path = normalize_path(full_name);
        self.cache
            .storage()
            .remove(&path)
            .map_err(|e| storage_error(&path, e))?;
        self.cache.invalidate(&path);
        tracing::info!(path = %path, "Removed template");
        Ok(())
    }
}
