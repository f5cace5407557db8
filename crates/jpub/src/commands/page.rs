//! `jpub page` command implementation.

use clap::Args;
use jpub_page::{Locale, Publisher, Resolution};

use super::{CommonArgs, page_manager, template_manager};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the page command.
#[derive(Args)]
pub(crate) struct PageArgs {
    /// Request path, e.g. `/blog/post.html`.
    path: String,

    /// Locale for page properties, e.g. `en_US` (overrides config).
    #[arg(short, long)]
    locale: Option<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl PageArgs {
    /// Resolve the page and print it with the context its actions produced.
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let config = self.common.load_config(self.locale)?;
        let locale = config
            .locale
            .default
            .as_deref()
            .map(str::parse::<Locale>)
            .transpose()?;

        let publisher = Publisher::new(page_manager(&config), template_manager(&config));
        match publisher.resolve(&self.path, locale.as_ref())? {
            Resolution::Page {
                page,
                template,
                context,
            } => {
                output.highlight(page.path());
                output.field("definition", page.definition_path());
                output.field("name", page.name());
                if let Some(title) = page.title() {
                    output.field("title", title);
                }
                output.field("template", template.path());
                if let Some(locale) = &locale {
                    output.field("locale", &locale.to_string());
                }
                output.separator();
                output.data(&serde_json::to_string_pretty(&context)?);
            }
            Resolution::Redirect(target) => {
                output.warning(&format!("{} redirects", self.path));
                output.field("redirect", &target);
            }
        }
        Ok(())
    }
}
