//! Resolution manifests
//!
//! Each resolved reference leaves a [`ResolutionRecord`] naming the path it
//! sits at, what it points to and which edition was chosen. The list of
//! records from one pass is the lockfile:
//!
//! ```json
//! [
//!   {"path": ["content", 0], "repository": "api.commonform.org",
//!    "publisher": "kemitchell", "project": "nda", "edition": "1e2u",
//!    "upgrade": true, "specified": "1e"}
//! ]
//! ```
//!
//! Feeding a lockfile back in as [`Resolutions`] pins every recorded path to
//! its recorded edition, so a later pass re-composes the same document
//! without consulting editions lists.

use std::collections::HashMap;
use std::fmt;
use std::path::Path as FsPath;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::path::Path;

/// What a record's reference points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Publication {
        repository: String,
        publisher: String,
        project: String,
    },
    Component {
        component: String,
    },
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Publication {
                repository,
                publisher,
                project,
            } => write!(f, "{}/{}/{}", repository, publisher, project),
            Target::Component { component } => f.write_str(component),
        }
    }
}

/// The edition chosen for the reference at one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    pub path: Path,
    #[serde(flatten)]
    pub target: Target,
    /// The edition that was actually used.
    pub edition: String,
    /// Whether the reference asked to be upgraded.
    #[serde(default)]
    pub upgrade: bool,
    /// The edition the reference asked for, when it asked for an upgrade.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specified: Option<String>,
}

impl ResolutionRecord {
    /// True when the chosen edition differs from the requested one.
    pub fn upgraded(&self) -> bool {
        self.specified
            .as_ref()
            .is_some_and(|specified| specified != &self.edition)
    }
}

/// Resolution overrides indexed by path.
#[derive(Debug, Clone, Default)]
pub struct Resolutions {
    by_path: HashMap<Path, ResolutionRecord>,
}

impl Resolutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// The override recorded for exactly `path`.
    pub fn get(&self, path: &Path) -> Option<&ResolutionRecord> {
        self.by_path.get(path)
    }
}

impl FromIterator<ResolutionRecord> for Resolutions {
    /// Later records for the same path replace earlier ones.
    fn from_iter<I: IntoIterator<Item = ResolutionRecord>>(records: I) -> Self {
        let by_path = records
            .into_iter()
            .map(|record| (record.path.clone(), record))
            .collect();
        Self { by_path }
    }
}

/// Read a manifest file.
pub fn load<P: AsRef<FsPath>>(path: P) -> Result<Vec<ResolutionRecord>> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

/// Parse manifest JSON.
pub fn parse(json: &str) -> Result<Vec<ResolutionRecord>> {
    Ok(serde_json::from_str(json)?)
}

/// Write a manifest file, pretty-printed.
pub fn save<P: AsRef<FsPath>>(path: P, records: &[ResolutionRecord]) -> Result<()> {
    let mut json = serde_json::to_string_pretty(records)?;
    json.push('\n');
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn publication_record(path: Path, edition: &str, specified: Option<&str>) -> ResolutionRecord {
        ResolutionRecord {
            path,
            target: Target::Publication {
                repository: "api.commonform.org".to_string(),
                publisher: "kemitchell".to_string(),
                project: "nda".to_string(),
            },
            edition: edition.to_string(),
            upgrade: specified.is_some(),
            specified: specified.map(str::to_string),
        }
    }

    #[test]
    fn test_record_json_shape() {
        let record = publication_record(Path::root().content(0), "1.1", Some("1"));
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "path": ["content", 0],
                "repository": "api.commonform.org",
                "publisher": "kemitchell",
                "project": "nda",
                "edition": "1.1",
                "upgrade": true,
                "specified": "1"
            })
        );
        assert!(record.upgraded());
    }

    #[test]
    fn test_component_record_parses() {
        let records = parse(
            r#"[{"path":["content",2],"component":"https://example.com/c","edition":"1.0.0"}]"#,
        )
        .unwrap();
        assert_eq!(
            records[0].target,
            Target::Component {
                component: "https://example.com/c".to_string()
            }
        );
        assert!(!records[0].upgrade);
        assert!(!records[0].upgraded());
    }

    #[test]
    fn test_resolutions_lookup_by_exact_path() {
        let resolutions: Resolutions = vec![
            publication_record(Path::root().content(0), "1e", None),
            publication_record(Path::root().content(1).form().content(0), "2e", None),
        ]
        .into_iter()
        .collect();

        assert_eq!(resolutions.len(), 2);
        assert_eq!(
            resolutions
                .get(&Path::root().content(1).form().content(0))
                .map(|record| record.edition.as_str()),
            Some("2e")
        );
        assert!(resolutions.get(&Path::root().content(1)).is_none());
    }

    #[test]
    fn test_save_and_load() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("resolutions.json");
        let records = vec![publication_record(Path::root().content(0), "1e1u", Some("1e"))];

        save(&file, &records).unwrap();
        assert_eq!(load(&file).unwrap(), records);
    }
}
