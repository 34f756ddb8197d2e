//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures and helper functions to reduce
//! duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_registry(fixtures::REGISTRY);
//!     // ... test code
//! }
//! ```

use assert_fs::prelude::*;
use std::env;
use std::path::Path;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::fixtures;
    #[allow(unused_imports)]
    pub use super::should_skip_network_tests;
    pub use super::TestFixture;
}

/// Form, registry and configuration documents used across tests.
#[allow(dead_code)]
pub mod fixtures {
    /// Registry with two compatible editions of `terms`, a component and a
    /// snippet.
    pub const REGISTRY: &str = r#"{
  "publications": [
    {
      "repository": "api.example.com",
      "publisher": "kyle",
      "project": "terms",
      "edition": "1.0.0",
      "form": {"content": ["Original terms."]}
    },
    {
      "repository": "api.example.com",
      "publisher": "kyle",
      "project": "terms",
      "edition": "1.1.0",
      "form": {"content": [{"use": "Seller"}, " sells."]}
    },
    {
      "repository": "api.example.com",
      "publisher": "kyle",
      "project": "terms",
      "edition": "2.0.0",
      "form": {"content": ["Breaking terms."]}
    }
  ],
  "components": {
    "https://components.example.com/warranty/1.0.0.json": {
      "form": {"content": ["No warranty."]}
    },
    "https://components.example.com/snippets/notice.json": {
      "form": {"content": ["Notice."]}
    }
  }
}"#;

    /// Form with an upgradable publication, a component and a snippet.
    pub const FORM: &str = r#"{
  "content": [
    "Agreement. ",
    {
      "repository": "api.example.com",
      "publisher": "kyle",
      "project": "terms",
      "edition": "1.0.0",
      "upgrade": true,
      "heading": "Terms",
      "substitutions": {"terms": {"Seller": "Vendor"}}
    },
    {"component": "https://components.example.com/warranty", "version": "1.0.0"},
    {"snippet": "https://components.example.com/snippets/notice.json"}
  ]
}"#;

    /// Form with no references at all.
    pub const LITERAL_FORM: &str = r#"{"content": ["Plain ", {"use": "Term"}, {"blank": ""}]}"#;

    /// Lockfile pinning `terms` back to 1.0.0.
    pub const PINNED_LOCKFILE: &str = r#"[
  {
    "path": ["content", 1],
    "repository": "api.example.com",
    "publisher": "kyle",
    "project": "terms",
    "edition": "1.0.0",
    "upgrade": true,
    "specified": "1.0.0"
  }
]"#;

    /// Configuration that only allows an unrelated repository.
    pub const RESTRICTIVE_CONFIG: &str = "repositories: [api.other.org]\n";

    /// Configuration with an unknown key.
    pub const INVALID_CONFIG: &str = "limits: 4\n";
}

/// Check if network tests should be skipped.
///
/// Returns `true` if the `SKIP_NETWORK_TESTS` environment variable is set.
#[allow(dead_code)]
pub fn should_skip_network_tests() -> bool {
    env::var("SKIP_NETWORK_TESTS").is_ok()
}

/// A test fixture that provides a temporary directory with input files.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new()
///     .with_registry(fixtures::REGISTRY)
///     .with_file("form.json", fixtures::FORM);
///
/// fixture
///     .command()
///     .arg("compose")
///     .arg("form.json")
///     .arg("--registry-file")
///     .arg(fixture.registry_path())
///     .assert()
///     .success();
/// ```
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a `.form-resolver.yaml` configuration file with the given content.
    #[allow(dead_code)]
    pub fn with_config(self, content: &str) -> Self {
        self.with_file(".form-resolver.yaml", content)
    }

    /// Add a `registry.json` fixture with the given content.
    pub fn with_registry(self, content: &str) -> Self {
        self.with_file("registry.json", content)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the registry fixture.
    pub fn registry_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("registry.json")
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command configured to run in this fixture's directory.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("form-resolver");
        cmd.current_dir(self.path());
        cmd.env_remove("FORM_RESOLVER_CONFIG");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Create a `compose` command reading from this fixture's registry.
    #[allow(dead_code)]
    pub fn compose_command(&self) -> assert_cmd::Command {
        let mut cmd = self.command();
        cmd.arg("compose")
            .arg("--registry-file")
            .arg(self.registry_path());
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.path().exists());
    }

    #[test]
    fn test_fixture_with_registry() {
        let fixture = TestFixture::new().with_registry(fixtures::REGISTRY);
        assert!(fixture.registry_path().exists());
    }

    #[test]
    fn test_fixtures_are_valid_json() {
        for document in [
            fixtures::REGISTRY,
            fixtures::FORM,
            fixtures::LITERAL_FORM,
            fixtures::PINNED_LOCKFILE,
        ] {
            serde_json::from_str::<serde_json::Value>(document).unwrap();
        }
    }
}
