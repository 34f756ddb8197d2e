//! # Form Registries
//!
//! This module provides the fetch side of resolution: the [`Registry`] trait
//! and its two implementations. The composer only ever talks to the trait,
//! which keeps transport concerns out of the resolver and lets tests swap in
//! a registry that records every call.
//!
//! - **[`HttpRegistry`]**: queries a publication API over HTTP(S):
//!
//!   | Lookup      | URL                                                                  |
//!   |-------------|----------------------------------------------------------------------|
//!   | editions    | `{scheme}://{repository}/publishers/{publisher}/projects/{project}/publications` |
//!   | publication | `.../publications/{edition}`                                         |
//!   | form        | `{scheme}://{repository}/forms/{digest}`                             |
//!   | component   | the component URL as given                                           |
//!
//!   A 404 answer is "not found" (`Ok(None)`). A body that is JSON of the
//!   wrong shape is an [`Error::MalformedPayload`]; any other failure is an
//!   [`Error::Transport`] passed through unchanged. Timeouts are the agent's
//!   business; nothing is retried.
//!
//! - **[`MemoryRegistry`]**: an in-process registry, built in code or loaded
//!   from a JSON fixture file, for offline composition and tests.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path as FsPath;
use std::sync::Mutex;
use std::time::Duration;

use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::digest::{self, Digest};
use crate::error::{Error, Result};
use crate::form::Form;
use crate::path::Path;

/// The publication record binding an edition to a form digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub digest: String,
    /// Any other fields the registry returns.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Publication {
    pub fn new(digest: &Digest) -> Self {
        Self {
            digest: digest.to_string(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Remote lookups the composer needs. `Ok(None)` means "not found".
pub trait Registry: Send + Sync {
    /// Every published edition of a project.
    fn editions(&self, repository: &str, publisher: &str, project: &str)
        -> Result<Option<Vec<String>>>;

    /// The publication record of one edition.
    fn publication(
        &self,
        repository: &str,
        publisher: &str,
        project: &str,
        edition: &str,
    ) -> Result<Option<Publication>>;

    /// A form body by digest.
    fn form(&self, repository: &str, digest: &str) -> Result<Option<Form>>;

    /// A raw component or snippet payload.
    fn component(&self, url: &str) -> Result<Option<Value>>;
}

/// URL of one version of a component: `{component}/{version}.json`, with the
/// version percent-encoded as a path segment. A component that is not a
/// usable base URL is an invalid reference at `path`.
pub fn component_url(component: &str, version: &str, path: &Path) -> Result<Url> {
    let invalid = |message: String| Error::InvalidReference {
        path: path.to_string(),
        message,
    };
    let mut url = Url::parse(component).map_err(|e| invalid(format!("{}: {}", component, e)))?;
    url.path_segments_mut()
        .map_err(|_| invalid(format!("{}: component URL cannot carry a path", component)))?
        .pop_if_empty()
        .push(&format!("{}.json", version));
    Ok(url)
}

/// Registry client speaking HTTP(S) through a `ureq` agent.
pub struct HttpRegistry {
    agent: ureq::Agent,
    scheme: String,
}

impl HttpRegistry {
    /// Create a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("form-resolver/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            scheme: "https".to_string(),
        }
    }

    /// Use a different URL scheme for repository lookups (`http` for a
    /// registry running locally).
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    fn endpoint(&self, repository: &str, segments: &[&str]) -> Result<Url> {
        let base = format!("{}://{}/", self.scheme, repository);
        let mut url = Url::parse(&base)?;
        url.path_segments_mut()
            .map_err(|_| Error::Transport {
                url: base.clone(),
                message: "repository URL cannot carry a path".to_string(),
                path: None,
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<Option<T>> {
        debug!("GET {}", url);
        let response = match self.agent.get(url.as_str()).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Ok(None),
            Err(ureq::Error::Status(code, response)) => {
                return Err(Error::Transport {
                    url: url.to_string(),
                    message: format!("HTTP {} {}", code, response.status_text()),
                    path: None,
                })
            }
            Err(e) => {
                return Err(Error::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                    path: None,
                })
            }
        };

        let mut body = String::new();
        response
            .into_reader()
            .read_to_string(&mut body)
            .map_err(|e| Error::Transport {
                url: url.to_string(),
                message: format!("failed to read body: {}", e),
                path: None,
            })?;
        let value: Value = serde_json::from_str(&body).map_err(|e| Error::Transport {
            url: url.to_string(),
            message: format!("invalid JSON: {}", e),
            path: None,
        })?;
        // Well-formed JSON of the wrong shape is the payload's fault, not the
        // transport's. The composer fills in the node address.
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| Error::MalformedPayload {
                source_url: url.to_string(),
                path: String::new(),
                message: e.to_string(),
            })
    }
}

impl Registry for HttpRegistry {
    fn editions(
        &self,
        repository: &str,
        publisher: &str,
        project: &str,
    ) -> Result<Option<Vec<String>>> {
        let url = self.endpoint(
            repository,
            &["publishers", publisher, "projects", project, "publications"],
        )?;
        self.get_json(&url)
    }

    fn publication(
        &self,
        repository: &str,
        publisher: &str,
        project: &str,
        edition: &str,
    ) -> Result<Option<Publication>> {
        let url = self.endpoint(
            repository,
            &[
                "publishers",
                publisher,
                "projects",
                project,
                "publications",
                edition,
            ],
        )?;
        self.get_json(&url)
    }

    fn form(&self, repository: &str, digest: &str) -> Result<Option<Form>> {
        let url = self.endpoint(repository, &["forms", digest])?;
        self.get_json(&url)
    }

    fn component(&self, url: &str) -> Result<Option<Value>> {
        let url = Url::parse(url)?;
        self.get_json(&url)
    }
}

/// One lookup made against a [`MemoryRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    Editions {
        repository: String,
        publisher: String,
        project: String,
    },
    Publication {
        repository: String,
        publisher: String,
        project: String,
        edition: String,
    },
    Form {
        repository: String,
        digest: String,
    },
    Component {
        url: String,
    },
}

/// One publication in a registry fixture file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixturePublication {
    pub repository: String,
    pub publisher: String,
    pub project: String,
    pub edition: String,
    pub form: Form,
}

/// JSON layout of a registry fixture file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryFixture {
    #[serde(default)]
    pub publications: Vec<FixturePublication>,
    /// Component payloads keyed by their full URL.
    #[serde(default)]
    pub components: HashMap<String, Value>,
}

type ProjectKey = (String, String, String);
type PublicationKey = (String, String, String, String);

/// In-process registry that records every lookup.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    editions: HashMap<ProjectKey, Vec<String>>,
    publications: HashMap<PublicationKey, Publication>,
    forms: HashMap<(String, String), Form>,
    components: HashMap<String, Value>,
    calls: Mutex<Vec<RegistryCall>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a fixture.
    pub fn from_fixture(fixture: RegistryFixture) -> Result<Self> {
        let mut registry = Self::new();
        for publication in fixture.publications {
            registry.publish(
                &publication.repository,
                &publication.publisher,
                &publication.project,
                &publication.edition,
                publication.form,
            )?;
        }
        for (url, payload) in fixture.components {
            registry.add_component(&url, payload);
        }
        Ok(registry)
    }

    /// Load a fixture file.
    pub fn from_file<P: AsRef<FsPath>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let fixture: RegistryFixture = serde_json::from_str(&content)?;
        Self::from_fixture(fixture)
    }

    /// Store `form` and publish it as `edition`, appending the edition to
    /// the project's editions list. Returns the form's digest.
    pub fn publish(
        &mut self,
        repository: &str,
        publisher: &str,
        project: &str,
        edition: &str,
        form: Form,
    ) -> Result<Digest> {
        let digest = self.add_form(repository, form)?;
        self.publications.insert(
            (
                repository.to_string(),
                publisher.to_string(),
                project.to_string(),
                edition.to_string(),
            ),
            Publication::new(&digest),
        );
        let editions = self
            .editions
            .entry((
                repository.to_string(),
                publisher.to_string(),
                project.to_string(),
            ))
            .or_default();
        if !editions.iter().any(|existing| existing == edition) {
            editions.push(edition.to_string());
        }
        Ok(digest)
    }

    /// Publish an edition pointing at an arbitrary digest, without storing a
    /// form for it.
    pub fn publish_digest(
        &mut self,
        repository: &str,
        publisher: &str,
        project: &str,
        edition: &str,
        digest: &Digest,
    ) {
        self.publications.insert(
            (
                repository.to_string(),
                publisher.to_string(),
                project.to_string(),
                edition.to_string(),
            ),
            Publication::new(digest),
        );
    }

    /// Replace a project's editions list.
    pub fn set_editions(
        &mut self,
        repository: &str,
        publisher: &str,
        project: &str,
        editions: &[&str],
    ) {
        self.editions.insert(
            (
                repository.to_string(),
                publisher.to_string(),
                project.to_string(),
            ),
            editions.iter().map(|edition| edition.to_string()).collect(),
        );
    }

    /// Store a form body under its digest.
    pub fn add_form(&mut self, repository: &str, form: Form) -> Result<Digest> {
        let digest = digest::hash(&form)?;
        self.forms
            .insert((repository.to_string(), digest.to_string()), form);
        Ok(digest)
    }

    /// Store a component payload under its full URL.
    pub fn add_component(&mut self, url: &str, payload: Value) {
        self.components.insert(url.to_string(), payload);
    }

    /// Every lookup made so far, in call order.
    pub fn calls(&self) -> Vec<RegistryCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    fn record(&self, call: RegistryCall) -> Result<()> {
        self.calls
            .lock()
            .map_err(|_| Error::LockPoisoned {
                context: "memory registry call log".to_string(),
            })?
            .push(call);
        Ok(())
    }
}

impl Registry for MemoryRegistry {
    fn editions(
        &self,
        repository: &str,
        publisher: &str,
        project: &str,
    ) -> Result<Option<Vec<String>>> {
        self.record(RegistryCall::Editions {
            repository: repository.to_string(),
            publisher: publisher.to_string(),
            project: project.to_string(),
        })?;
        Ok(self
            .editions
            .get(&(
                repository.to_string(),
                publisher.to_string(),
                project.to_string(),
            ))
            .cloned())
    }

    fn publication(
        &self,
        repository: &str,
        publisher: &str,
        project: &str,
        edition: &str,
    ) -> Result<Option<Publication>> {
        self.record(RegistryCall::Publication {
            repository: repository.to_string(),
            publisher: publisher.to_string(),
            project: project.to_string(),
            edition: edition.to_string(),
        })?;
        Ok(self
            .publications
            .get(&(
                repository.to_string(),
                publisher.to_string(),
                project.to_string(),
                edition.to_string(),
            ))
            .cloned())
    }

    fn form(&self, repository: &str, digest: &str) -> Result<Option<Form>> {
        self.record(RegistryCall::Form {
            repository: repository.to_string(),
            digest: digest.to_string(),
        })?;
        Ok(self
            .forms
            .get(&(repository.to_string(), digest.to_string()))
            .cloned())
    }

    fn component(&self, url: &str) -> Result<Option<Value>> {
        self.record(RegistryCall::Component {
            url: url.to_string(),
        })?;
        Ok(self.components.get(url).cloned())
    }
}
