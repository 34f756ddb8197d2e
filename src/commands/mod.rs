//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `form-resolver` command-line tool. Each subcommand is defined in its own
//! file.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic, calling into the `form_resolver` library.
//!
//! Helpers shared by several commands live here.

pub mod compose;
pub mod hash;
pub mod tree;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

use form_resolver::config::{self, Config};
use form_resolver::defaults::DEFAULT_CONFIG_FILE;
use form_resolver::form::Form;

/// Load the configuration file.
///
/// An explicit path must exist. Otherwise `.form-resolver.yaml` in the
/// working directory is used when present, and built-in defaults when not.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => path,
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                return Ok(Config::default());
            }
            default
        }
    };
    debug!("Loading configuration from {}", path.display());
    config::from_file(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Read a whole input file, or stdin when the path is `-`.
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read stdin")?;
        return Ok(content);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Read and parse a form from a file or stdin.
pub fn read_form(path: &Path) -> Result<Form> {
    let content = read_input(path)?;
    Form::from_json_str(&content)
        .with_context(|| format!("Failed to parse form from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_missing_explicit_file() {
        let error = load_config(Some(Path::new("/nonexistent/.form-resolver.yaml"))).unwrap_err();
        assert!(error.to_string().contains("Failed to load config"));
    }

    #[test]
    fn test_load_config_explicit_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("resolver.yaml");
        std::fs::write(&file, "limit: 6\n").unwrap();
        assert_eq!(load_config(Some(&file)).unwrap().limit, 6);
    }

    #[test]
    fn test_read_form_reports_parse_errors() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("form.json");
        std::fs::write(&file, "{\"content\": [").unwrap();
        let error = read_form(&file).unwrap_err();
        assert!(error.to_string().contains("Failed to parse form"));
    }
}
