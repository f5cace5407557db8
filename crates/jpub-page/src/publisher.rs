//! Request resolution: page, actions, template.

use std::sync::Arc;

use jpub_storage::Storage;

use crate::action::ActionContext;
use crate::error::PublishError;
use crate::instance::PageInstance;
use crate::locale::Locale;
use crate::manager::PageManager;
use crate::template::{Template, TemplateManager};

/// Outcome of resolving a request.
#[derive(Debug)]
pub enum Resolution {
    /// The page, its template, and the context its actions produced.
    Page {
        page: Arc<PageInstance>,
        template: Arc<Template>,
        context: ActionContext,
    },
    /// An action asked to redirect to another location.
    Redirect(String),
}

/// Wires pages and templates together for one request at a time.
pub struct Publisher<P: Storage + ?Sized = dyn Storage, T: Storage + ?Sized = dyn Storage> {
    pages: PageManager<P>,
    templates: TemplateManager<T>,
}

impl<P: Storage + ?Sized, T: Storage + ?Sized> Publisher<P, T> {
    #[must_use]
    pub fn new(pages: PageManager<P>, templates: TemplateManager<T>) -> Self {
        Self { pages, templates }
    }

    #[must_use]
    pub fn pages(&self) -> &PageManager<P> {
        &self.pages
    }

    #[must_use]
    pub fn templates(&self) -> &TemplateManager<T> {
        &self.templates
    }

    /// Resolve a request path for a locale.
    ///
    /// Looks up the page (with default fallback), fills a fresh context with
    /// its title and properties, runs its actions, and finally loads its
    /// template. A redirect from an action short-circuits before the
    /// template is loaded.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Page`] if the page cannot be resolved or an
    /// action fails, and [`PublishError::Template`] if its template cannot
    /// be loaded.
    pub fn resolve(
        &self,
        request_path: &str,
        locale: Option<&Locale>,
    ) -> Result<Resolution, PublishError> {
        let page = self.pages.page(request_path)?;

        let mut context = ActionContext::new();
        page.populate_context(&mut context, locale);
        if let Some(target) = page.execute_actions(&mut context)? {
            return Ok(Resolution::Redirect(target));
        }

        let template = self.templates.template(&page.full_template_name())?;
        tracing::debug!(
            path = request_path,
            template = template.path(),
            "Resolved page"
        );
        Ok(Resolution::Page {
            page,
            template,
            context,
        })
    }
}
