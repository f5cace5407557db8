//! Configuration tree node.

use std::collections::HashMap;

/// One element of a parsed configuration document.
///
/// A read-only view over an XML element: its name, attributes, trimmed text
/// value, and child elements in document order. Trees are never mutated after
/// parsing; a changed source produces a whole new tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    name: String,
    value: String,
    attributes: HashMap<String, String>,
    children: Vec<Configuration>,
    location: String,
}

impl Configuration {
    /// Create an element with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the text value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Add an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Append a child element.
    #[must_use]
    pub fn with_child(mut self, child: Configuration) -> Self {
        self.children.push(child);
        self
    }

    /// Set the source identifier.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Element name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Text content with surrounding whitespace trimmed.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Source identifier this element was parsed from (e.g., "/blog/post.xml").
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Attribute value by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Attribute value by name, or `default` if absent.
    #[must_use]
    pub fn attribute_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.attribute(name).unwrap_or(default)
    }

    /// First child element with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Configuration> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements with the given name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Configuration> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// All child elements, in document order.
    #[must_use]
    pub fn children(&self) -> &[Configuration] {
        &self.children
    }

    /// Text value of the first child with the given name.
    ///
    /// Returns `None` when the child is absent or its value is empty.
    #[must_use]
    pub fn child_value(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(Configuration::value)
            .filter(|v| !v.is_empty())
    }

    pub(crate) fn push_text(&mut self, text: &str) {
        self.value.push_str(text);
    }

    pub(crate) fn push_child(&mut self, child: Configuration) {
        self.children.push(child);
    }

    pub(crate) fn finish(&mut self) {
        let trimmed = self.value.trim();
        if trimmed.len() != self.value.len() {
            self.value = trimmed.to_owned();
        }
    }
}
