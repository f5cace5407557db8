//! Page definitions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use jpub_xml::Configuration;

use crate::action::ActionRegistry;
use crate::error::PageError;
use crate::instance::PageInstance;

/// A parsed page definition file and the instances derived from it.
///
/// One definition backs every request path that maps to its definition path
/// (`/blog/post.html`, `/blog/post.json`, ...). Instances are cached by exact
/// request path until the configuration is replaced.
#[derive(Debug)]
pub struct PageDefinition {
    path: String,
    actions: Arc<ActionRegistry>,
    default_template: String,
    state: Mutex<DefinitionState>,
}

#[derive(Debug)]
struct DefinitionState {
    configuration: Arc<Configuration>,
    instances: HashMap<String, Arc<PageInstance>>,
}

impl PageDefinition {
    /// Create a definition for `path` from its parsed configuration.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        configuration: Configuration,
        actions: Arc<ActionRegistry>,
        default_template: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            actions,
            default_template: default_template.into(),
            state: Mutex::new(DefinitionState {
                configuration: Arc::new(configuration),
                instances: HashMap::new(),
            }),
        }
    }

    /// Definition path, e.g. `/blog/post`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current configuration.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn configuration(&self) -> Arc<Configuration> {
        Arc::clone(&self.state.lock().unwrap().configuration)
    }

    /// Replace the configuration and drop every cached instance.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn load_configuration(&self, configuration: Configuration) {
        let mut state = self.state.lock().unwrap();
        state.configuration = Arc::new(configuration);
        let dropped = state.instances.len();
        state.instances.clear();
        tracing::debug!(path = %self.path, dropped, "Replaced page configuration");
    }

    /// Instance for an exact request path, derived on first use.
    ///
    /// Cached instances are returned as-is until the next
    /// [`load_configuration`](Self::load_configuration).
    ///
    /// # Errors
    ///
    /// Returns [`PageError`] if the configuration cannot be turned into an
    /// instance (see [`PageInstance::from_configuration`]). Failures are not
    /// cached.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn instance(&self, request_path: &str) -> Result<Arc<PageInstance>, PageError> {
        let mut state = self.state.lock().unwrap();
        if let Some(instance) = state.instances.get(request_path) {
            return Ok(Arc::clone(instance));
        }

        let instance = Arc::new(PageInstance::from_configuration(
            request_path,
            &self.path,
            &state.configuration,
            &self.actions,
            &self.default_template,
        )?);
        state
            .instances
            .insert(request_path.to_owned(), Arc::clone(&instance));
        Ok(instance)
    }

    /// Instance for a request path, derived from the current configuration
    /// but not cached.
    ///
    /// Used for request paths that fell back to this definition, which are
    /// unbounded and would otherwise grow the instance map.
    ///
    /// # Errors
    ///
    /// Same as [`instance`](Self::instance).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn uncached_instance(&self, request_path: &str) -> Result<Arc<PageInstance>, PageError> {
        let configuration = self.configuration();
        PageInstance::from_configuration(
            request_path,
            &self.path,
            &configuration,
            &self.actions,
            &self.default_template,
        )
        .map(Arc::new)
    }

    /// Number of cached instances.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.state.lock().unwrap().instances.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(PageDefinition: Send, Sync);

    fn definition(xml: &str) -> PageDefinition {
        let config = jpub_xml::parse(xml.as_bytes(), "/a.xml").unwrap();
        PageDefinition::new("/a", config, Arc::new(ActionRegistry::new()), "basic")
    }

    #[test]
    fn test_instance_cached_by_request_path() {
        let definition = definition("<page><title>Hello</title></page>");

        let html = definition.instance("/a.html").unwrap();
        let again = definition.instance("/a.html").unwrap();
        let json = definition.instance("/a.json").unwrap();

        assert!(Arc::ptr_eq(&html, &again));
        assert!(!Arc::ptr_eq(&html, &json));
        assert_eq!(json.page_type(), Some("json"));
        assert_eq!(json.definition_path(), "/a");
        assert_eq!(definition.instance_count(), 2);
    }

    #[test]
    fn test_load_configuration_clears_instances() {
        let definition = definition("<page><title>Hello</title></page>");
        let before = definition.instance("/a.html").unwrap();

        definition.load_configuration(
            Configuration::new("page").with_child(Configuration::new("title").with_value("World")),
        );

        assert_eq!(definition.instance_count(), 0);
        let after = definition.instance("/a.html").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(before.title(), Some("Hello"));
        assert_eq!(after.title(), Some("World"));
        assert_eq!(definition.configuration().child_value("title"), Some("World"));
    }

    #[test]
    fn test_uncached_instance() {
        let definition = definition("<page><title>Hello</title></page>");

        let first = definition.uncached_instance("/other.html").unwrap();
        let second = definition.uncached_instance("/other.html").unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.path(), "/other.html");
        assert_eq!(first.definition_path(), "/a");
        assert_eq!(first.title(), Some("Hello"));
        assert_eq!(definition.instance_count(), 0);
    }

    #[test]
    fn test_instance_failure_not_cached() {
        let definition = definition(r#"<page><page-action name="missing"/></page>"#);

        assert!(definition.instance("/a.html").is_err());
        assert_eq!(definition.instance_count(), 0);
    }
}
