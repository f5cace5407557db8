//! Page instances.

use std::collections::HashMap;

use jpub_xml::Configuration;
use serde_json::{Map, Value};

use crate::action::{ActionContext, ActionRegistry, BoundAction};
use crate::error::PageError;
use crate::locale::{Locale, PageProperty};
use crate::path::{to_file_name, to_page_name, to_page_type};

/// Context key holding the request path.
pub const PAGE_KEY: &str = "page";
/// Context key holding the page title.
pub const TITLE_KEY: &str = "title";
/// Context key holding the locale-resolved properties as an object.
pub const PROPERTIES_KEY: &str = "properties";

/// One concrete page, for one exact request path.
///
/// Instances are derived from a [`PageDefinition`](crate::PageDefinition)'s
/// configuration and never change afterwards; a reloaded definition derives
/// new instances.
#[derive(Debug)]
pub struct PageInstance {
    path: String,
    definition_path: String,
    name: String,
    page_type: Option<String>,
    title: Option<String>,
    template: Option<String>,
    default_template: String,
    properties: HashMap<String, PageProperty>,
    actions: Vec<BoundAction>,
}

impl PageInstance {
    /// Derive an instance for `request_path` from a definition's configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::Invalid`] for a `<property>` or `<page-action>`
    /// without a `name` or a `<property>` whose `locale` does not parse, and
    /// [`PageError::UnknownAction`] for an action missing from `actions`.
    pub fn from_configuration(
        request_path: &str,
        definition_path: &str,
        config: &Configuration,
        actions: &ActionRegistry,
        default_template: &str,
    ) -> Result<Self, PageError> {
        let invalid = |message: &str| PageError::Invalid {
            path: config.location().to_owned(),
            message: message.to_owned(),
        };

        let mut properties: HashMap<String, PageProperty> = HashMap::new();
        for element in config.children_named("property") {
            let name = element
                .attribute("name")
                .ok_or_else(|| invalid("<property> requires a name attribute"))?;
            let locale = element.attribute_or("locale", "");
            if !locale.trim().is_empty()
                && let Err(e) = locale.parse::<Locale>()
            {
                return Err(invalid(&format!("<property name=\"{name}\">: {e}")));
            }
            properties
                .entry(name.to_owned())
                .or_insert_with(|| PageProperty::new(name))
                .set_value(locale, element.value());
        }

        let mut bound = Vec::new();
        for element in config.children_named("page-action") {
            let name = element
                .attribute("name")
                .ok_or_else(|| invalid("<page-action> requires a name attribute"))?;
            let action = actions
                .get(name)
                .ok_or_else(|| PageError::UnknownAction {
                    path: config.location().to_owned(),
                    action: name.to_owned(),
                })?;
            bound.push(BoundAction::new(name.to_owned(), action, element.clone()));
        }

        Ok(Self {
            path: request_path.to_owned(),
            definition_path: definition_path.to_owned(),
            name: to_page_name(request_path).unwrap_or_else(|| to_file_name(request_path)),
            page_type: to_page_type(request_path),
            title: config.child_value("title").map(str::to_owned),
            template: config.child_value("template").map(str::to_owned),
            default_template: default_template.to_owned(),
            properties,
            actions: bound,
        })
    }

    /// Request path this instance was derived for.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Definition path of the definition this instance came from.
    ///
    /// Differs from the definition path of [`path`](Self::path) when the
    /// instance was served by the default page.
    #[must_use]
    pub fn definition_path(&self) -> &str {
        &self.definition_path
    }

    /// Filename without suffix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request suffix (`html` for `/a.html`), if any.
    #[must_use]
    pub fn page_type(&self) -> Option<&str> {
        self.page_type.as_deref()
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Template name: the definition's `<template>` or the default.
    #[must_use]
    pub fn template_name(&self) -> &str {
        self.template.as_deref().unwrap_or(&self.default_template)
    }

    /// Template name qualified with the page type, e.g. `basic.html`.
    #[must_use]
    pub fn full_template_name(&self) -> String {
        match &self.page_type {
            Some(page_type) => format!("{}.{page_type}", self.template_name()),
            None => self.template_name().to_owned(),
        }
    }

    /// Property value resolved for a locale (`None` for the default value).
    #[must_use]
    pub fn property(&self, name: &str, locale: Option<&Locale>) -> Option<&str> {
        self.properties.get(name)?.value(locale)
    }

    /// All properties, sorted by name.
    #[must_use]
    pub fn properties(&self) -> Vec<&PageProperty> {
        let mut properties: Vec<_> = self.properties.values().collect();
        properties.sort_unstable_by(|a, b| a.name().cmp(b.name()));
        properties
    }

    #[must_use]
    pub fn actions(&self) -> &[BoundAction] {
        &self.actions
    }

    /// Run the bound actions in order.
    ///
    /// Stops as soon as an action sets a redirect and returns its target;
    /// returns `None` once every action ran without redirecting.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::Action`] for the first action that fails.
    pub fn execute_actions(
        &self,
        context: &mut ActionContext,
    ) -> Result<Option<String>, PageError> {
        for action in &self.actions {
            action
                .execute(context)
                .map_err(|source| PageError::Action {
                    action: action.name().to_owned(),
                    source,
                })?;
            if let Some(target) = context.redirect() {
                tracing::debug!(
                    page = %self.path,
                    action = action.name(),
                    redirect = target,
                    "Action redirected"
                );
                return Ok(Some(target.to_owned()));
            }
        }
        Ok(None)
    }

    /// Write the page, its title, and its locale-resolved properties into a
    /// context.
    pub fn populate_context(&self, context: &mut ActionContext, locale: Option<&Locale>) {
        context.insert(PAGE_KEY, self.path.as_str());
        if let Some(title) = &self.title {
            context.insert(TITLE_KEY, title.as_str());
        }

        let properties: Map<String, Value> = self
            .properties
            .values()
            .filter_map(|p| {
                p.value(locale)
                    .map(|v| (p.name().to_owned(), Value::from(v)))
            })
            .collect();
        context.insert(PROPERTIES_KEY, Value::Object(properties));
    }
}
