//! `jpub pages` command implementation.

use clap::Args;

use super::{CommonArgs, page_manager};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the pages command.
#[derive(Args)]
pub(crate) struct PagesArgs {
    /// Directory to list (default: all pages).
    #[arg(default_value = "/")]
    dir: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl PagesArgs {
    /// List every page under the directory.
    ///
    /// Broken definitions are reported as warnings and do not stop the
    /// listing.
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let config = self.common.load_config(None)?;
        output.info(&format!(
            "Pages: {}",
            config.pages_resolved.root.display()
        ));

        let pages = page_manager(&config);
        let mut count = 0usize;
        let mut failed = 0usize;
        for result in pages.pages(&self.dir) {
            match result {
                Ok(page) => {
                    count += 1;
                    match page.title() {
                        Some(title) => output.data(&format!("{}\t{title}", page.path())),
                        None => output.data(page.path()),
                    }
                }
                Err(e) => {
                    failed += 1;
                    output.warning(&format!("Skipped: {e}"));
                }
            }
        }

        output.info(&format!("{count} pages, {failed} skipped"));
        Ok(())
    }
}
