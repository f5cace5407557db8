//! Page actions and their execution context.
//!
//! An [`Action`] is a named unit of work bound to a page through a
//! `<page-action name="...">` element. Actions are looked up by name in an
//! [`ActionRegistry`] when a page instance is derived, and run in document
//! order against a shared [`ActionContext`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use jpub_xml::Configuration;
use serde::Serialize;
use serde_json::Value;

/// Context key an action sets to request a redirect.
pub const REDIRECT_KEY: &str = "redirect";

/// Error raised by an action.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ActionError {
    /// The action ran and failed.
    #[error("{0}")]
    Failed(String),

    /// The action's `<page-action>` element is missing something it needs.
    #[error("invalid action configuration: {0}")]
    InvalidConfig(String),
}

/// Per-request key/value store shared by the actions of one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ActionContext {
    values: HashMap<String, Value>,
}

impl ActionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String value for a key, if present and a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Redirect target set by an action, if any.
    #[must_use]
    pub fn redirect(&self) -> Option<&str> {
        self.get_str(REDIRECT_KEY)
    }

    pub fn set_redirect(&mut self, target: impl Into<String>) {
        self.values
            .insert(REDIRECT_KEY.to_owned(), Value::String(target.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A unit of work run while publishing a page.
///
/// `config` is the action's `<page-action>` element, so one action
/// implementation can be parameterized per page with `<param>` children.
pub trait Action: Send + Sync {
    /// Run the action.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] if the action fails; remaining actions of the
    /// page are not run.
    fn execute(&self, context: &mut ActionContext, config: &Configuration)
    -> Result<(), ActionError>;
}

impl<F> Action for F
where
    F: Fn(&mut ActionContext, &Configuration) -> Result<(), ActionError> + Send + Sync,
{
    fn execute(
        &self,
        context: &mut ActionContext,
        config: &Configuration,
    ) -> Result<(), ActionError> {
        self(context, config)
    }
}

/// Actions available to page definitions, by name.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action under a name, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, action: impl Action + 'static) {
        self.actions.insert(name.into(), Arc::new(action));
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, action: impl Action + 'static) -> Self {
        self.register(name, action);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}

/// An action bound to a page, with its `<page-action>` element.
#[derive(Clone)]
pub struct BoundAction {
    name: String,
    action: Arc<dyn Action>,
    config: Configuration,
}

impl BoundAction {
    pub(crate) fn new(name: String, action: Arc<dyn Action>, config: Configuration) -> Self {
        Self {
            name,
            action,
            config,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub(crate) fn execute(&self, context: &mut ActionContext) -> Result<(), ActionError> {
        self.action.execute(context, &self.config)
    }
}

impl fmt::Debug for BoundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAction")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
