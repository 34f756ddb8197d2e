//! # Compose Command Implementation
//!
//! This module implements the `compose` subcommand, which resolves every
//! reference in a form and writes the fully inlined result.
//!
//! ## Functionality
//!
//! - **Resolution**: Fetches referenced publications, components and
//!   snippets over HTTP, or from a registry fixture file with
//!   `--registry-file`.
//! - **Lockfiles**: Writes the resolution records with `--lockfile`, and
//!   pins editions from an earlier lockfile with `--resolutions`.
//! - **Policy**: Repository and hostname whitelists, the concurrency limit
//!   and the edition scheme come from the configuration file and can be
//!   overridden by flags.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use log::info;

use form_resolver::compose::{Caches, ComposeOptions, Composer};
use form_resolver::config::Config;
use form_resolver::edition::EditionScheme;
use form_resolver::manifest;
use form_resolver::registry::{HttpRegistry, MemoryRegistry, Registry};

/// Resolve every reference in a form
#[derive(Args, Debug)]
pub struct ComposeArgs {
    /// Form to compose, as a JSON file, or `-` for stdin.
    #[arg(value_name = "FORM")]
    pub form: PathBuf,

    /// Lockfile from an earlier run whose editions should be reused.
    #[arg(long, value_name = "FILE")]
    pub resolutions: Option<PathBuf>,

    /// Write the resolution records of this run to FILE.
    #[arg(long, value_name = "FILE")]
    pub lockfile: Option<PathBuf>,

    /// Write the composed form to FILE instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Maximum number of sibling references resolved at once.
    #[arg(long, value_name = "NUM")]
    pub limit: Option<usize>,

    /// Allow publication references to this repository (repeatable).
    ///
    /// Replaces the configured list when given.
    #[arg(long = "repository", value_name = "HOST")]
    pub repositories: Vec<String>,

    /// Allow component and snippet references to this hostname (repeatable).
    ///
    /// Replaces the configured list when given.
    #[arg(long = "hostname", value_name = "HOST")]
    pub hostnames: Vec<String>,

    /// Edition scheme: semver or reviewers.
    #[arg(long, value_name = "SCHEME")]
    pub editions: Option<EditionScheme>,

    /// Do not cache registry lookups.
    #[arg(long)]
    pub no_cache: bool,

    /// Also cache "not found" answers.
    #[arg(long)]
    pub cache_not_found: bool,

    /// Resolve against a JSON registry fixture instead of the network.
    #[arg(long, value_name = "FILE")]
    pub registry_file: Option<PathBuf>,

    /// HTTP timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Execute the `compose` command.
pub fn execute(args: ComposeArgs, config: Config) -> Result<()> {
    let form = super::read_form(&args.form)?;
    let options = compose_options(&args, &config)?;

    let registry: Arc<dyn Registry> = match &args.registry_file {
        Some(path) => Arc::new(
            MemoryRegistry::from_file(path)
                .with_context(|| format!("Failed to load registry from {}", path.display()))?,
        ),
        None => {
            let timeout = args
                .timeout
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.timeout());
            Arc::new(HttpRegistry::new(timeout))
        }
    };

    let caches = if args.no_cache {
        Caches::disabled()
    } else {
        Caches::in_memory().with_cache_not_found(args.cache_not_found || config.cache_not_found)
    };

    let scheme = args.editions.unwrap_or(config.editions);
    let composer = Composer::new(registry)
        .with_strategy(scheme.strategy())
        .with_caches(caches);

    let composition = composer
        .compose(&form, &options)
        .with_context(|| format!("Failed to compose {}", args.form.display()))?;

    let mut json = serde_json::to_string_pretty(&composition.form)?;
    json.push('\n');
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote composed form to {}", path.display());
        }
        None => print!("{}", json),
    }

    if let Some(path) = &args.lockfile {
        manifest::save(path, &composition.resolutions)
            .with_context(|| format!("Failed to write lockfile {}", path.display()))?;
        info!(
            "Wrote {} resolution record(s) to {}",
            composition.resolutions.len(),
            path.display()
        );
    }

    Ok(())
}

/// Merge command-line flags over the configuration file.
fn compose_options(args: &ComposeArgs, config: &Config) -> Result<ComposeOptions> {
    let mut options = config.compose_options();
    if !args.repositories.is_empty() {
        options.repositories = args.repositories.clone();
    }
    if !args.hostnames.is_empty() {
        options.hostnames = args.hostnames.clone();
    }
    if let Some(limit) = args.limit {
        options.limit = limit;
    }
    if let Some(path) = &args.resolutions {
        options.resolutions = manifest::load(path)
            .with_context(|| format!("Failed to load resolutions from {}", path.display()))?;
    }
    Ok(options)
}
