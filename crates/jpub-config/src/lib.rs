//! `jpub.toml` loading.
//!
//! [`Config::load`] reads an explicit file or the first `jpub.toml` found
//! walking up from the working directory, resolves relative directories
//! against the file's own directory, and applies [`CliSettings`] on top.
//! Without any file, defaults relative to the working directory are used.
//!
//! ## Environment variables
//!
//! `${VAR}` is replaced by the variable (unset is an error) and
//! `${VAR:-fallback}` falls back to the literal when unset. Applies to:
//! - `pages.root`
//! - `pages.default_page`
//! - `templates.root`
//! - `locale.default`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Command-line overrides, applied after the file is loaded.
///
/// `None` leaves the loaded value alone.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override page definitions directory.
    pub pages_root: Option<PathBuf>,
    /// Override templates directory.
    pub templates_root: Option<PathBuf>,
    /// Override default page definition path.
    pub default_page: Option<String>,
    /// Override default locale.
    pub locale: Option<String>,
}

/// File name looked up by discovery.
const CONFIG_FILENAME: &str = "jpub.toml";

/// Default page type used when listing pages.
const DEFAULT_SUFFIX: &str = "html";

/// Default template name.
const DEFAULT_TEMPLATE: &str = "basic";

/// Project configuration: where pages and templates live.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Page configuration (paths are relative strings from TOML).
    pages: PagesConfigRaw,
    /// Template configuration (paths are relative strings from TOML).
    templates: TemplatesConfigRaw,
    /// Locale configuration.
    pub locale: LocaleConfig,

    /// Resolved page configuration (set after loading).
    #[serde(skip)]
    pub pages_resolved: PagesConfig,
    /// Resolved template configuration (set after loading).
    #[serde(skip)]
    pub templates_resolved: TemplatesConfig,
    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw page configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PagesConfigRaw {
    root: Option<String>,
    suffix: Option<String>,
    default_page: Option<String>,
}

/// Resolved page configuration with absolute paths.
#[derive(Debug, Default)]
pub struct PagesConfig {
    /// Directory holding page definition files.
    pub root: PathBuf,
    /// Page type used when listing pages.
    pub suffix: String,
    /// Definition path served when a requested page does not exist.
    pub default_page: Option<String>,
}

/// Raw template configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TemplatesConfigRaw {
    root: Option<String>,
    default: Option<String>,
}

/// Resolved template configuration with absolute paths.
#[derive(Debug, Default)]
pub struct TemplatesConfig {
    /// Directory holding templates.
    pub root: PathBuf,
    /// Template used by pages without a `<template>` element.
    pub default: String,
}

/// Locale configuration.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct LocaleConfig {
    /// Locale used when a command is given none, e.g. `en_US`.
    pub default: Option<String>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("config file {} does not exist", .0.display())]
    NotFound(PathBuf),

    /// I/O error.
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error.
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// A `${VAR}` reference could not be expanded.
    #[error("cannot expand {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`pages.root`").
        field: String,
        /// Error message (e.g., "${`PAGES_DIR`} not set").
        message: String,
    },
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

impl Config {
    /// Load `config_path`, or the discovered `jpub.toml`, or defaults.
    ///
    /// `cli_settings` win over file values and are validated together with
    /// them.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the configuration (including CLI overrides) is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(root) = &settings.pages_root {
            self.pages_resolved.root.clone_from(root);
        }
        if let Some(root) = &settings.templates_root {
            self.templates_resolved.root.clone_from(root);
        }
        if let Some(default_page) = &settings.default_page {
            self.pages_resolved.default_page = Some(default_page.clone());
        }
        if let Some(locale) = &settings.locale {
            self.locale.default = Some(locale.clone());
        }
    }

    /// Nearest `jpub.toml` in the working directory or an ancestor.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Defaults with `pages/` and `templates/` under `base`.
    fn default_with_base(base: &Path) -> Self {
        Self {
            pages: PagesConfigRaw::default(),
            templates: TemplatesConfigRaw::default(),
            locale: LocaleConfig::default(),
            pages_resolved: PagesConfig {
                root: base.join("pages"),
                suffix: DEFAULT_SUFFIX.to_owned(),
                default_page: None,
            },
            templates_resolved: TemplatesConfig {
                root: base.join("templates"),
                default: DEFAULT_TEMPLATE.to_owned(),
            },
            config_path: None,
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Before resolving, so `${HOME}/pages` ends up absolute
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Check the resolved values.
    ///
    /// [`load`](Self::load) already calls this; call it again after mutating
    /// the resolved fields by hand.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_pages()?;
        require_non_empty(&self.templates_resolved.default, "templates.default")?;
        if let Some(locale) = &self.locale.default {
            require_non_empty(locale, "locale.default")?;
            if locale.starts_with(['_', '-']) {
                return Err(ConfigError::Validation(format!(
                    "locale.default '{locale}' has no language"
                )));
            }
        }
        Ok(())
    }

    /// Validate page configuration.
    fn validate_pages(&self) -> Result<(), ConfigError> {
        let suffix = &self.pages_resolved.suffix;
        require_non_empty(suffix, "pages.suffix")?;
        if suffix.contains(['.', '/']) {
            return Err(ConfigError::Validation(format!(
                "pages.suffix '{suffix}' must not contain '.' or '/'"
            )));
        }

        if let Some(default_page) = &self.pages_resolved.default_page
            && !default_page.starts_with('/')
        {
            return Err(ConfigError::Validation(format!(
                "pages.default_page '{default_page}' must start with '/'"
            )));
        }
        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref root) = self.pages.root {
            self.pages.root = Some(expand::expand_env(root, "pages.root")?);
        }
        if let Some(ref default_page) = self.pages.default_page {
            self.pages.default_page = Some(expand::expand_env(default_page, "pages.default_page")?);
        }
        if let Some(ref root) = self.templates.root {
            self.templates.root = Some(expand::expand_env(root, "templates.root")?);
        }
        if let Some(ref locale) = self.locale.default {
            self.locale.default = Some(expand::expand_env(locale, "locale.default")?);
        }
        Ok(())
    }

    /// Fill the resolved sections, joining directories onto `config_dir`.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.pages_resolved = PagesConfig {
            root: resolve(self.pages.root.as_deref(), "pages"),
            suffix: self
                .pages
                .suffix
                .clone()
                .unwrap_or_else(|| DEFAULT_SUFFIX.to_owned()),
            default_page: self.pages.default_page.clone(),
        };

        self.templates_resolved = TemplatesConfig {
            root: resolve(self.templates.root.as_deref(), "templates"),
            default: self
                .templates
                .default
                .clone()
                .unwrap_or_else(|| DEFAULT_TEMPLATE.to_owned()),
        };
    }
}
