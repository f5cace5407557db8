//! CLI command implementations.

pub(crate) mod page;
pub(crate) mod pages;
pub(crate) mod template;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use jpub_config::{CliSettings, Config};
use jpub_page::{PageManager, PageSettings, TemplateManager};
use jpub_storage::Storage;
use jpub_storage_fs::FsStorage;

use crate::actions::builtin_actions;
use crate::error::CliError;

pub(crate) use page::PageArgs;
pub(crate) use pages::PagesArgs;
pub(crate) use template::TemplateArgs;

/// Arguments shared by every command.
#[derive(Args)]
pub(crate) struct CommonArgs {
    /// Path to configuration file (default: auto-discover jpub.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Page definitions directory (overrides config).
    #[arg(short, long)]
    pages_dir: Option<PathBuf>,

    /// Templates directory (overrides config).
    #[arg(short, long)]
    templates_dir: Option<PathBuf>,

    /// Definition path served for missing pages (overrides config).
    #[arg(long)]
    default_page: Option<String>,

    /// Enable verbose output (cache hits, loads and fallbacks).
    #[arg(short, long)]
    pub verbose: bool,
}

impl CommonArgs {
    /// Load the configuration with these arguments as overrides.
    pub(crate) fn load_config(&self, locale: Option<String>) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            pages_root: self.pages_dir.clone(),
            templates_root: self.templates_dir.clone(),
            default_page: self.default_page.clone(),
            locale,
        };
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }
}

/// Page manager over the configured pages directory.
pub(crate) fn page_manager(config: &Config) -> PageManager {
    let storage: Arc<dyn Storage> = Arc::new(FsStorage::new(config.pages_resolved.root.clone()));
    let settings = PageSettings {
        default_template: config.templates_resolved.default.clone(),
        default_page: config.pages_resolved.default_page.clone(),
        suffix: config.pages_resolved.suffix.clone(),
    };
    PageManager::new(storage, Arc::new(builtin_actions()), settings)
}

/// Template manager over the configured templates directory.
pub(crate) fn template_manager(config: &Config) -> TemplateManager {
    let storage: Arc<dyn Storage> =
        Arc::new(FsStorage::new(config.templates_resolved.root.clone()));
    TemplateManager::new(storage)
}
