//! JPub CLI - page and template inspection.
//!
//! Provides commands for:
//! - `page`: Resolve a request path and show the page, template and context
//! - `pages`: List every page under a directory
//! - `template`: Show a template and its configuration

mod actions;
mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{PageArgs, PagesArgs, TemplateArgs};
use output::Output;

/// JPub - page publishing.
#[derive(Parser)]
#[command(name = "jpub", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a page by request path.
    Page(PageArgs),
    /// List pages under a directory.
    Pages(PagesArgs),
    /// Show a template.
    Template(TemplateArgs),
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Self::Page(args) => args.common.verbose,
            Self::Pages(args) => args.common.verbose,
            Self::Template(args) => args.common.verbose,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables DEBUG level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.command.verbose() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Page(args) => args.execute(&output),
        Commands::Pages(args) => args.execute(&output),
        Commands::Template(args) => args.execute(&output),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
