//! Page and template definition caches for JPub.
//!
//! This crate provides:
//! - Path resolution from request paths to definition paths ([`to_definition_path`])
//! - [`DefinitionCache`]: page definitions keyed by definition path, validated
//!   against source mtimes, with default-page fallback
//! - [`PageDefinition`] / [`PageInstance`]: a parsed definition and the
//!   concrete pages derived from it, one per request path
//! - Locale-aware page properties ([`PageProperty`], [`Locale`])
//! - Page actions ([`Action`], [`ActionRegistry`], [`ActionContext`])
//! - [`TemplateCache`] / [`TemplateManager`]: templates and their sibling
//!   configuration, invalidated the same way
//! - [`PageManager`] and [`Publisher`] tying it together
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! use jpub_page::{
//!     ActionRegistry, PageManager, PageSettings, Publisher, Resolution, TemplateManager,
//! };
//! use jpub_storage_fs::FsStorage;
//!
//! let pages = PageManager::new(
//!     Arc::new(FsStorage::new(PathBuf::from("pages"))),
//!     Arc::new(ActionRegistry::new()),
//!     PageSettings::default(),
//! );
//! let templates = TemplateManager::new(Arc::new(FsStorage::new(PathBuf::from("templates"))));
//! let publisher = Publisher::new(pages, templates);
//!
//! match publisher.resolve("/blog/post.html", None)? {
//!     Resolution::Page { page, template, .. } => {
//!         println!("{} via {}", page.path(), template.path());
//!     }
//!     Resolution::Redirect(target) => println!("-> {target}"),
//! }
//! # Ok(())
//! # }
//! ```

mod action;
mod definition;
mod definition_cache;
mod error;
mod instance;
mod iter;
mod locale;
mod manager;
mod mtime_cache;
pub mod path;
mod publisher;
mod template;

pub use action::{Action, ActionContext, ActionError, ActionRegistry, BoundAction, REDIRECT_KEY};
pub use definition::PageDefinition;
pub use definition_cache::{DefinitionCache, DefinitionCacheEntry, PageSettings};
pub use error::{PageError, PublishError, TemplateError};
pub use instance::{PAGE_KEY, PROPERTIES_KEY, PageInstance, TITLE_KEY};
pub use iter::PageIter;
pub use locale::{InvalidLocale, Locale, PageProperty};
pub use manager::PageManager;
pub use mtime_cache::CacheEntry;
pub use path::{to_definition_path, to_page_name, to_page_type, to_resource_path};
pub use publisher::{Publisher, Resolution};
pub use template::{
    Template, TemplateCache, TemplateCacheEntry, TemplateManager, TemplateStamp, config_path,
};
