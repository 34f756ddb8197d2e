//! Node addressing within a form tree
//!
//! A [`Path`] is the sequence of markers and indices that leads from the root
//! form to one node, the same way a JSON pointer would: `["content", 2,
//! "form", "content", 0]`. Paths are unique within a single resolution pass,
//! which makes them the key for resolution overrides and manifest records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One step of a [`Path`]: a field marker or an index into `content`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    Index(usize),
    Key(String),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Index(index) => write!(f, "{}", index),
            Segment::Key(key) => f.write_str(key),
        }
    }
}

/// Address of a node from the root form.
///
/// Serializes as a plain JSON array so manifests stay readable:
/// `["content", 0, "form"]`.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Path(Vec<Segment>);

impl Path {
    /// The path of the root form.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path of the content element at `index` below this node.
    pub fn content(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Key("content".to_string()));
        segments.push(Segment::Index(index));
        Self(segments)
    }

    /// Path of the `form` nested inside this node.
    pub fn form(&self) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Key("form".to_string()));
        Self(segments)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of nested forms between the root and this node.
    pub fn depth(&self) -> usize {
        self.0
            .iter()
            .filter(|segment| matches!(segment, Segment::Key(key) if key == "form"))
            .count()
    }

    /// Returns the enclosing reference path, i.e. the path without its
    /// trailing `form` marker and last `content` index pair.
    pub fn parent_reference(&self) -> Option<Path> {
        let segments = &self.0;
        let form_at = segments
            .iter()
            .rposition(|segment| matches!(segment, Segment::Key(key) if key == "form"))?;
        if form_at < 2 {
            return None;
        }
        Some(Path(segments[..form_at].to_vec()))
    }
}

impl From<Vec<Segment>> for Path {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        let parts: Vec<String> = self.0.iter().map(|segment| segment.to_string()).collect();
        f.write_str(&parts.join("/"))
    }
}
