//! # Configuration File
//!
//! This module defines the `.form-resolver.yaml` configuration file and its
//! parsing. Every field is optional; anything left out falls back to the
//! values in [`crate::defaults`], and command-line flags override whatever
//! the file says.
//!
//! ```yaml
//! repositories: [api.commonform.org]
//! hostnames: [commonform.org]
//! limit: 4
//! cache_not_found: false
//! editions: reviewers
//! timeout_secs: 30
//! ```
//!
//! An empty `repositories` or `hostnames` list means "no whitelist": every
//! repository or component host is allowed.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compose::ComposeOptions;
use crate::defaults::{DEFAULT_PARALLEL_LIMIT, DEFAULT_TIMEOUT_SECS};
use crate::edition::EditionScheme;
use crate::error::{Error, Result};

/// Parsed `.form-resolver.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Repositories publication references may point at.
    #[serde(default)]
    pub repositories: Vec<String>,
    /// Hostnames component and snippet references may point at.
    #[serde(default)]
    pub hostnames: Vec<String>,
    /// Sibling references resolved at once.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Remember not-found answers in the request cache.
    #[serde(default)]
    pub cache_not_found: bool,
    /// Edition ordering and upgrade rules.
    #[serde(default)]
    pub editions: EditionScheme,
    /// HTTP timeout for registry lookups.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_limit() -> usize {
    DEFAULT_PARALLEL_LIMIT
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            hostnames: Vec::new(),
            limit: DEFAULT_PARALLEL_LIMIT,
            cache_not_found: false,
            editions: EditionScheme::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Composer options carried by this configuration.
    pub fn compose_options(&self) -> ComposeOptions {
        ComposeOptions {
            repositories: self.repositories.clone(),
            hostnames: self.hostnames.clone(),
            limit: self.limit,
            ..ComposeOptions::default()
        }
    }
}

/// Parse configuration YAML.
pub fn parse(yaml_content: &str) -> Result<Config> {
    if yaml_content.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(yaml_content).map_err(|e| Error::ConfigParse {
        message: e.to_string(),
        hint: hint_for(&e.to_string()),
    })
}

fn hint_for(message: &str) -> Option<String> {
    if message.contains("unknown field") {
        Some(
            "Valid keys are: repositories, hostnames, limit, cache_not_found, editions, timeout_secs"
                .to_string(),
        )
    } else if message.contains("unknown variant") {
        Some("`editions` must be either `semver` or `reviewers`".to_string())
    } else {
        None
    }
}

/// Load and parse a configuration file.
pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}
