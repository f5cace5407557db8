//! Error types for page and template lookup.

use jpub_storage::StorageError;
use jpub_xml::ConfigurationError;

use crate::action::ActionError;

/// Error while resolving a page.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PageError {
    /// No definition exists for the path and no default page is configured.
    #[error("Page not found: {0}")]
    NotFound(String),

    /// The definition file is not well-formed XML.
    #[error("Invalid page definition {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ConfigurationError,
    },

    /// The definition parsed but is structurally invalid.
    #[error("Invalid page definition {path}: {message}")]
    Invalid { path: String, message: String },

    /// The definition names an action that is not registered.
    #[error("Unknown action '{action}' in {path}")]
    UnknownAction { path: String, action: String },

    /// An action failed while executing.
    #[error("Action '{action}' failed: {source}")]
    Action {
        action: String,
        #[source]
        source: ActionError,
    },

    /// Backing store failure other than a missing file.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Error while resolving a template.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    /// The sibling configuration file is not well-formed XML.
    #[error("Invalid template configuration {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ConfigurationError,
    },

    /// Template text is not valid UTF-8.
    #[error("Template {path} is not valid UTF-8")]
    Encoding {
        path: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Error while publishing a request.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl PublishError {
    /// Whether the request failed because a page or template was missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Page(PageError::NotFound(_)) | Self::Template(TemplateError::NotFound(_))
        )
    }
}
