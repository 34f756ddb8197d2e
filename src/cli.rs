//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use form_resolver::defaults::CONFIG_ENV_VAR;

/// Form Resolver - Compose forms that reference other published forms
#[derive(Parser, Debug)]
#[command(name = "form-resolver")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to .form-resolver.yaml when present)
    #[arg(long, global = true, value_name = "FILE", env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Set log level (off, error, warn, info, debug, trace)
    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        default_value = "warn",
        value_parser = ["off", "error", "warn", "info", "debug", "trace"]
    )]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve every reference in a form and print the composed form
    Compose(commands::compose::ComposeArgs),

    /// Print the content digest of a form
    Hash(commands::hash::HashArgs),

    /// Display a lockfile as a tree of resolved references
    Tree(commands::tree::TreeArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        match self.command {
            Commands::Compose(args) => {
                let config = commands::load_config(self.config.as_deref())?;
                commands::compose::execute(args, config)
            }
            Commands::Hash(args) => commands::hash::execute(args),
            Commands::Tree(args) => commands::tree::execute(args),
        }
    }
}

/// Route `log` output to stderr. `RUST_LOG`, when set, refines the level
/// given on the command line.
fn init_logging(level: &str) {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.format_timestamp(None).format_target(false);
    // A logger may already be installed when running under a test harness.
    let _ = builder.try_init();
}
