//! Default values for form-resolver configuration.
//!
//! This module provides centralized default values used by the library and
//! the CLI, ensuring consistency and avoiding duplication.

use std::time::Duration;

/// Number of sibling references resolved at once unless configured
/// otherwise. One means strictly sequential resolution.
pub const DEFAULT_PARALLEL_LIMIT: usize = 1;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".form-resolver.yaml";

/// Environment variable naming an alternative configuration file.
pub const CONFIG_ENV_VAR: &str = "FORM_RESOLVER_CONFIG";

/// Default HTTP timeout for registry lookups, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Returns the default HTTP timeout for registry lookups.
pub fn default_timeout() -> Duration {
    Duration::from_secs(DEFAULT_TIMEOUT_SECS)
}
