//! CLI error types.

use jpub_config::ConfigError;
use jpub_page::{InvalidLocale, PageError, PublishError, TemplateError};

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Locale(#[from] InvalidLocale),

    #[error("{0}")]
    Page(#[from] PageError),

    #[error("{0}")]
    Template(#[from] TemplateError),

    #[error("{0}")]
    Publish(#[from] PublishError),

    #[error("{0}")]
    Json(#[from] serde_json::Error),
}
