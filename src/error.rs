//! # Error Handling
//!
//! This module defines the centralized error type for `form-resolver`. It uses
//! the `thiserror` library to build a single `Error` enum covering every
//! failure a resolution pass can hit, each variant carrying enough context to
//! localize the failure without reading logs.
//!
//! ## Taxonomy
//!
//! - **`UnauthorizedReference`**: a repository or hostname outside a
//!   non-empty whitelist. Raised before any network call is made.
//! - **`NotFound`**: an editions list, publication, form or component that
//!   the registry reports as missing.
//! - **`CycleDetected`**: a digest that is already on the ancestor chain.
//! - **`EditionResolutionFailed`**: no available edition satisfies the
//!   upgrade request.
//! - **`MalformedPayload`**: fetched data fails minimal shape validation.
//! - **`Transport`**: network or status failures, passed through unchanged.
//!
//! Everything else (configuration, cache, I/O and parsing errors) is ambient
//! plumbing around the resolver.
//!
//! The `Result` type alias is used throughout the library.

use thiserror::Error;

use crate::path::Path;

/// Main error type for form-resolver operations
#[derive(Error, Debug)]
pub enum Error {
    /// A reference points at a repository or hostname outside the whitelist.
    #[error("Unauthorized {kind} at {path}: {name}")]
    UnauthorizedReference {
        /// Either `repository` or `hostname`.
        kind: &'static str,
        name: String,
        path: String,
    },

    /// The registry reported a resource as missing.
    #[error("Not found at {path}: {what}")]
    NotFound { what: String, path: String },

    /// A form digest was reached again on its own ancestor chain.
    #[error("Cycle detected at {path}: {digest}")]
    CycleDetected { digest: String, path: String },

    /// None of the available editions satisfies the upgrade request.
    #[error("No edition of {reference} compatible with {requested} at {path}")]
    EditionResolutionFailed {
        reference: String,
        requested: String,
        path: String,
    },

    /// Fetched data does not have the expected shape.
    #[error("Malformed payload from {source_url} at {path}: {message}")]
    MalformedPayload {
        source_url: String,
        path: String,
        message: String,
    },

    /// A reference element that cannot be acted on, such as an unparseable
    /// component URL.
    #[error("Invalid reference at {path}: {message}")]
    InvalidReference { path: String, message: String },

    /// A network or HTTP status failure reported by the registry client.
    /// The composer fills in `path` with the node that triggered the fetch.
    #[error("Transport error: {url} - {message}{}", path.as_ref().map(|p| format!(" (at {})", p)).unwrap_or_default())]
    Transport {
        url: String,
        message: String,
        path: Option<String>,
    },

    /// An error raised by a cache store.
    #[error("Cache operation error: {message}")]
    Cache { message: String },

    /// The worker pool for a resolution pass could not be started.
    #[error("Scheduler error: {message}")]
    Scheduler { message: String },

    /// An error occurred while parsing the configuration file.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Returns true for errors that mean "the registry does not have it",
    /// as opposed to policy, structural or transport failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::EditionResolutionFailed { .. }
        )
    }

    /// Attach the node address to a registry error raised without one.
    /// Errors that already name a node are returned unchanged.
    pub fn at_path(self, at: &Path) -> Self {
        match self {
            Error::Transport {
                url,
                message,
                path: None,
            } => Error::Transport {
                url,
                message,
                path: Some(at.to_string()),
            },
            Error::MalformedPayload {
                source_url,
                path,
                message,
            } if path.is_empty() => Error::MalformedPayload {
                source_url,
                path: at.to_string(),
                message,
            },
            other => other,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
