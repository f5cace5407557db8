//! `jpub template` command implementation.

use clap::Args;

use super::{CommonArgs, template_manager};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the template command.
#[derive(Args)]
pub(crate) struct TemplateArgs {
    /// Template name with page type, e.g. `basic.html`.
    name: String,

    /// Print only the template properties.
    #[arg(long)]
    properties: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl TemplateArgs {
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let config = self.common.load_config(None)?;
        let template = template_manager(&config).template(&self.name)?;

        output.highlight(template.path());
        if let Some(configuration) = template.configuration() {
            for property in configuration.children_named("property") {
                if let Some(name) = property.attribute("name") {
                    output.field(name, property.value());
                }
            }
        }
        if !self.properties {
            output.separator();
            output.data(template.text());
        }
        Ok(())
    }
}
