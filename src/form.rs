//! # Form Data Model
//!
//! A [`Form`] is an ordered sequence of [`ContentElement`]s plus any other
//! metadata keys, which are carried through resolution untouched.
//!
//! Content elements arrive as loosely shaped JSON. They are classified once,
//! at parse time, into an exhaustive enum so the composer can match on them
//! instead of probing for fields:
//!
//! | JSON key present | Variant                          |
//! |------------------|----------------------------------|
//! | `repository`     | [`ContentElement::Publication`]  |
//! | `component`      | [`ContentElement::Component`]    |
//! | `snippet`        | [`ContentElement::Snippet`]      |
//! | `form`           | [`ContentElement::Child`]        |
//! | `blank`          | [`ContentElement::Blank`]        |
//! | anything else    | [`ContentElement::Literal`]      |
//!
//! An object carrying a reference key but missing one of the reference's
//! required fields is a parse error rather than a literal.

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// A composable document tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub content: Vec<ContentElement>,
    /// Every other key of the form object, such as `conspicuous`.
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

impl Form {
    pub fn new(content: Vec<ContentElement>) -> Self {
        Self {
            content,
            metadata: BTreeMap::new(),
        }
    }

    /// Parse a form from its JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a form from an already decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Returns a copy of this form with its content replaced.
    pub fn with_content(&self, content: Vec<ContentElement>) -> Self {
        Self {
            content,
            metadata: self.metadata.clone(),
        }
    }

    /// True when no reference element remains anywhere in the tree.
    pub fn is_fully_inlined(&self) -> bool {
        self.content.iter().all(|element| match element {
            ContentElement::Child(child) => child.form.is_fully_inlined(),
            other => !other.is_reference(),
        })
    }
}

/// One entry of a form's `content` array.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentElement {
    /// Text and inline markup (`use`, `definition`, `reference`, ...).
    Literal(Value),
    /// A fill-in blank.
    Blank(Value),
    /// A nested form that needs no network access.
    Child(Child),
    /// A publication identified by repository, publisher, project and edition.
    Publication(PublicationRef),
    /// A versioned component fetched from a URL.
    Component(ComponentRef),
    /// An unversioned snippet fetched from a URL.
    Snippet(SnippetRef),
}

impl ContentElement {
    /// Classify a raw JSON content element.
    pub fn classify(value: Value) -> std::result::Result<Self, serde_json::Error> {
        let object = match &value {
            Value::Object(object) => object,
            _ => return Ok(ContentElement::Literal(value)),
        };

        if object.contains_key("repository") {
            serde_json::from_value(value).map(ContentElement::Publication)
        } else if object.contains_key("component") {
            serde_json::from_value(value).map(ContentElement::Component)
        } else if object.contains_key("snippet") {
            serde_json::from_value(value).map(ContentElement::Snippet)
        } else if object.contains_key("form") {
            serde_json::from_value(value).map(ContentElement::Child)
        } else if object.contains_key("blank") {
            Ok(ContentElement::Blank(value))
        } else {
            Ok(ContentElement::Literal(value))
        }
    }

    /// True for elements that must be fetched from somewhere.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            ContentElement::Publication(_)
                | ContentElement::Component(_)
                | ContentElement::Snippet(_)
        )
    }

    /// Wrap a resolved form the way every reference is inlined.
    pub fn child(form: Form, heading: Option<String>) -> Self {
        ContentElement::Child(Child { form, heading })
    }
}

impl<'de> Deserialize<'de> for ContentElement {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        ContentElement::classify(value).map_err(de::Error::custom)
    }
}

impl Serialize for ContentElement {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ContentElement::Literal(value) | ContentElement::Blank(value) => {
                value.serialize(serializer)
            }
            ContentElement::Child(child) => child.serialize(serializer),
            ContentElement::Publication(reference) => reference.serialize(serializer),
            ContentElement::Component(reference) => reference.serialize(serializer),
            ContentElement::Snippet(reference) => reference.serialize(serializer),
        }
    }
}

/// A nested form with an optional heading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Child {
    pub form: Form,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
}

/// Replacements applied to a resolved sub-form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitutions {
    /// Defined term replacements, old term to new term.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub terms: BTreeMap<String, String>,
    /// Heading replacements, old heading to new heading.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headings: BTreeMap<String, String>,
}

impl Substitutions {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.headings.is_empty()
    }
}

/// Reference to a publication in a form repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationRef {
    pub repository: String,
    pub publisher: String,
    pub project: String,
    pub edition: String,
    /// Resolve to the latest compatible edition instead of pinning.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub upgrade: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitutions: Option<Substitutions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
}

impl PublicationRef {
    /// `repository/publisher/project`, used in messages and records.
    pub fn identity(&self) -> String {
        format!("{}/{}/{}", self.repository, self.publisher, self.project)
    }
}

/// Reference to a versioned component published at a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRef {
    pub component: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitutions: Option<Substitutions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
}

/// Legacy reference to a snippet published at a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnippetRef {
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitutions: Option<Substitutions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
}
