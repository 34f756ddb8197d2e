//! # Composition
//!
//! The composer turns a form containing references into a fully inlined
//! form plus the list of resolution records that pins how every reference
//! was resolved.
//!
//! ## Process
//!
//! Every content element of a form is resolved as an independent task on the
//! pass's [`Scheduler`]:
//!
//! 1.  **Literals and blanks** pass through unchanged.
//! 2.  **Inline children** are resolved recursively in place.
//! 3.  **Publication references** are checked against the repository
//!     whitelist, get an edition from [`edition::resolve_edition`], have
//!     their publication looked up for a digest, pass the cycle guard, have
//!     their form fetched and resolved recursively, and finally get their
//!     substitutions applied.
//! 4.  **Component and snippet references** are checked against the
//!     hostname whitelist, fetched from their URL, validated to carry a
//!     `form`, and then go through the same digest, cycle, recurse and
//!     substitute steps.
//!
//! Results are reassembled in input order. The first error anywhere aborts
//! the pass; no partially composed form is ever returned.
//!
//! ## Context
//!
//! A [`Context`] travels down the recursion. It is never mutated: descending
//! into a sub-form builds a new context with the extended path and ancestry,
//! so sibling branches cannot see each other's state.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;
use url::Url;

use crate::ancestry::Ancestry;
use crate::cache::{CacheStore, FetchCache, MemoryStore};
use crate::defaults::DEFAULT_PARALLEL_LIMIT;
use crate::digest::{self, Digest};
use crate::edition::{self, EditionRequest, EditionStrategy, SemverStrategy};
use crate::error::{Error, Result};
use crate::form::{ComponentRef, ContentElement, Form, PublicationRef, SnippetRef, Substitutions};
use crate::manifest::{ResolutionRecord, Resolutions, Target};
use crate::path::Path;
use crate::registry::{self, Publication, Registry};
use crate::scheduler::Scheduler;
use crate::substitute::{Substitute, TermSubstitution};

/// One resolved content element and the records produced below it.
type Resolved = (ContentElement, Vec<ResolutionRecord>);

/// Caller-supplied settings for one resolution pass.
#[derive(Debug, Clone)]
pub struct ComposeOptions {
    /// Allowed repositories; empty allows all.
    pub repositories: Vec<String>,
    /// Allowed component and snippet hostnames; empty allows all.
    pub hostnames: Vec<String>,
    /// Records from an earlier pass, pinning editions by path.
    pub resolutions: Vec<ResolutionRecord>,
    /// Sibling references resolved at once.
    pub limit: usize,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            hostnames: Vec::new(),
            resolutions: Vec::new(),
            limit: DEFAULT_PARALLEL_LIMIT,
        }
    }
}

/// Request caches, one per lookup kind.
#[derive(Debug, Clone)]
pub struct Caches {
    pub editions: FetchCache<Vec<String>>,
    pub publications: FetchCache<Publication>,
    pub forms: FetchCache<Form>,
    pub components: FetchCache<Value>,
}

impl Caches {
    /// Every lookup goes to the registry.
    pub fn disabled() -> Self {
        Self::from_store(None)
    }

    /// All kinds share one in-process store.
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// All kinds share `store`; keys are namespaced by kind.
    pub fn with_store(store: Arc<dyn CacheStore>) -> Self {
        Self::from_store(Some(store))
    }

    fn from_store(store: Option<Arc<dyn CacheStore>>) -> Self {
        Self {
            editions: FetchCache::new("editions", store.clone()),
            publications: FetchCache::new("publications", store.clone()),
            forms: FetchCache::new("forms", store.clone()),
            components: FetchCache::new("components", store),
        }
    }

    /// Also cache not-found answers, for every kind.
    pub fn with_cache_not_found(self, enabled: bool) -> Self {
        Self {
            editions: self.editions.with_cache_not_found(enabled),
            publications: self.publications.with_cache_not_found(enabled),
            forms: self.forms.with_cache_not_found(enabled),
            components: self.components.with_cache_not_found(enabled),
        }
    }
}

impl Default for Caches {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Per-branch state threaded through the recursion.
#[derive(Debug, Clone)]
pub struct Context {
    pub ancestry: Ancestry,
    pub path: Path,
    pub repositories: Arc<BTreeSet<String>>,
    pub hostnames: Arc<BTreeSet<String>>,
    pub resolutions: Arc<Resolutions>,
    pub caches: Caches,
    pub limit: usize,
}

impl Context {
    /// Root context for a pass, with empty ancestry.
    pub fn new(options: &ComposeOptions, caches: Caches) -> Self {
        Self {
            ancestry: Ancestry::new(),
            path: Path::root(),
            repositories: Arc::new(options.repositories.iter().cloned().collect()),
            hostnames: Arc::new(
                options
                    .hostnames
                    .iter()
                    .map(|hostname| hostname.to_lowercase())
                    .collect(),
            ),
            resolutions: Arc::new(options.resolutions.iter().cloned().collect()),
            caches,
            limit: options.limit,
        }
    }

    pub fn with_ancestry(self, ancestry: Ancestry) -> Self {
        Self { ancestry, ..self }
    }

    /// Context for the form at `path`, keeping the current ancestry.
    fn at(&self, path: Path) -> Self {
        Self {
            path,
            ..self.clone()
        }
    }

    /// Context for a fetched form at `path` with its extended ancestry.
    fn descend(&self, path: Path, ancestry: Ancestry) -> Self {
        Self {
            path,
            ancestry,
            ..self.clone()
        }
    }

    fn check_repository(&self, repository: &str, path: &Path) -> Result<()> {
        if !self.repositories.is_empty() && !self.repositories.contains(repository) {
            return Err(Error::UnauthorizedReference {
                kind: "repository",
                name: repository.to_string(),
                path: path.to_string(),
            });
        }
        Ok(())
    }

    fn check_hostname(&self, url: &Url, path: &Path) -> Result<()> {
        let Some(hostname) = url.host_str() else {
            return Err(Error::InvalidReference {
                path: path.to_string(),
                message: format!("{} has no hostname", url),
            });
        };
        if !self.hostnames.is_empty() && !self.hostnames.contains(&hostname.to_lowercase()) {
            return Err(Error::UnauthorizedReference {
                kind: "hostname",
                name: hostname.to_string(),
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

/// Result of a resolution pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    /// The fully inlined form.
    pub form: Form,
    /// One record per resolved versioned reference.
    pub resolutions: Vec<ResolutionRecord>,
}

/// Recursive reference resolver.
#[derive(Clone)]
pub struct Composer {
    registry: Arc<dyn Registry>,
    strategy: Arc<dyn EditionStrategy>,
    substituter: Arc<dyn Substitute>,
    caches: Caches,
}

impl Composer {
    /// A composer over `registry` with semantic-version editions, the
    /// default substitution engine and an in-process request cache.
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            registry,
            strategy: Arc::new(SemverStrategy),
            substituter: Arc::new(TermSubstitution),
            caches: Caches::in_memory(),
        }
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn EditionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_substituter(mut self, substituter: Arc<dyn Substitute>) -> Self {
        self.substituter = substituter;
        self
    }

    pub fn with_caches(mut self, caches: Caches) -> Self {
        self.caches = caches;
        self
    }

    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    /// Compose `form` from scratch.
    ///
    /// The root form's own digest starts the ancestry, so a reference that
    /// resolves back to the root is reported as a cycle.
    pub fn compose(&self, form: &Form, options: &ComposeOptions) -> Result<Composition> {
        let root = digest::hash(form)?;
        info!(
            "Composing form {} ({} element(s), limit {})",
            root,
            form.content.len(),
            options.limit.max(1)
        );
        let context = Context::new(options, self.caches.clone()).with_ancestry(Ancestry::rooted(root));
        let composition = self.resolve(form, &context)?;
        info!(
            "Composed form with {} resolution record(s)",
            composition.resolutions.len()
        );
        Ok(composition)
    }

    /// Resolve `form` under a caller-built context.
    pub fn resolve(&self, form: &Form, context: &Context) -> Result<Composition> {
        let scheduler = Arc::new(Scheduler::new(context.limit)?);
        let (form, resolutions) = self.resolve_form(form, context, &scheduler)?;
        Ok(Composition { form, resolutions })
    }

    fn resolve_form(
        &self,
        form: &Form,
        context: &Context,
        scheduler: &Arc<Scheduler>,
    ) -> Result<(Form, Vec<ResolutionRecord>)> {
        // Tasks own their inputs so a failed batch can return while siblings
        // are still running.
        let tasks: Vec<_> = form
            .content
            .iter()
            .enumerate()
            .map(|(index, element)| {
                let composer = self.clone();
                let element = element.clone();
                let context = context.clone();
                let scheduler = Arc::clone(scheduler);
                move || {
                    let path = context.path.content(index);
                    composer.resolve_element(&element, path, &context, &scheduler)
                }
            })
            .collect();

        let resolved: Vec<Resolved> = scheduler.run(tasks)?;

        let mut content = Vec::with_capacity(resolved.len());
        let mut records = Vec::new();
        for (element, element_records) in resolved {
            content.push(element);
            records.extend(element_records);
        }
        Ok((form.with_content(content), records))
    }

    fn resolve_element(
        &self,
        element: &ContentElement,
        path: Path,
        context: &Context,
        scheduler: &Arc<Scheduler>,
    ) -> Result<Resolved> {
        match element {
            ContentElement::Literal(_) | ContentElement::Blank(_) => Ok((element.clone(), Vec::new())),
            ContentElement::Child(child) => {
                let (form, records) = self.resolve_form(&child.form, &context.at(path.form()), scheduler)?;
                Ok((ContentElement::child(form, child.heading.clone()), records))
            }
            ContentElement::Publication(reference) => {
                self.resolve_publication(reference, path, context, scheduler)
            }
            ContentElement::Component(reference) => {
                self.resolve_component(reference, path, context, scheduler)
            }
            ContentElement::Snippet(reference) => {
                self.resolve_snippet(reference, path, context, scheduler)
            }
        }
    }

    fn resolve_publication(
        &self,
        reference: &PublicationRef,
        path: Path,
        context: &Context,
        scheduler: &Arc<Scheduler>,
    ) -> Result<Resolved> {
        context.check_repository(&reference.repository, &path)?;

        let identity = reference.identity();
        let target = Target::Publication {
            repository: reference.repository.clone(),
            publisher: reference.publisher.clone(),
            project: reference.project.clone(),
        };
        let pinned = context.resolutions.get(&path);
        if let Some(record) = pinned {
            if record.target != target {
                warn!(
                    "Resolution for {} names {}, but the reference there is {}",
                    path, record.target, identity
                );
            }
        }

        let request = EditionRequest {
            reference: &identity,
            requested: &reference.edition,
            upgrade: reference.upgrade,
            pinned: pinned.map(|record| record.edition.as_str()),
            path: &path,
        };
        let resolved = edition::resolve_edition(&request, self.strategy.as_ref(), || {
            context.caches.editions.get_or_fetch(
                &[
                    reference.repository.as_str(),
                    reference.publisher.as_str(),
                    reference.project.as_str(),
                ],
                || {
                    self.registry
                        .editions(&reference.repository, &reference.publisher, &reference.project)
                },
            )
            .map_err(|e| e.at_path(&path))
        })?;
        let edition = resolved.edition;

        let publication = context
            .caches
            .publications
            .get_or_fetch(
                &[
                    reference.repository.as_str(),
                    reference.publisher.as_str(),
                    reference.project.as_str(),
                    edition.as_str(),
                ],
                || {
                    self.registry.publication(
                        &reference.repository,
                        &reference.publisher,
                        &reference.project,
                        &edition,
                    )
                },
            )
            .map_err(|e| e.at_path(&path))?
            .ok_or_else(|| Error::NotFound {
                what: format!("publication {} {}", identity, edition),
                path: path.to_string(),
            })?;
        let digest = Digest::from(publication.digest);

        // Checked before the body is fetched: a cycle needs no download.
        let ancestry = context.ancestry.enter(&digest, &path)?;

        let fetched = context
            .caches
            .forms
            .get_or_fetch(&[reference.repository.as_str(), digest.as_str()], || {
                self.registry.form(&reference.repository, digest.as_str())
            })
            .map_err(|e| e.at_path(&path))?
            .ok_or_else(|| Error::NotFound {
                what: format!("form {} in {}", digest, reference.repository),
                path: path.to_string(),
            })?;

        debug!("Resolved {} {} to {} at {}", identity, edition, digest, path);

        let (form, mut records) = self.expand(
            &fetched,
            &path,
            ancestry,
            reference.substitutions.as_ref(),
            context,
            scheduler,
        )?;
        records.insert(
            0,
            ResolutionRecord {
                path,
                target,
                edition,
                upgrade: reference.upgrade,
                specified: reference.upgrade.then(|| reference.edition.clone()),
            },
        );
        Ok((ContentElement::child(form, reference.heading.clone()), records))
    }

    fn resolve_component(
        &self,
        reference: &ComponentRef,
        path: Path,
        context: &Context,
        scheduler: &Arc<Scheduler>,
    ) -> Result<Resolved> {
        let base = parse_reference_url(&reference.component, &path)?;
        context.check_hostname(&base, &path)?;

        let target = Target::Component {
            component: reference.component.clone(),
        };
        let version = match context.resolutions.get(&path) {
            Some(record) => {
                if record.target != target {
                    warn!(
                        "Resolution for {} names {}, but the reference there is {}",
                        path, record.target, reference.component
                    );
                }
                record.edition.clone()
            }
            None => reference.version.clone(),
        };

        let url = registry::component_url(&reference.component, &version, &path)?;
        let fetched = self.fetch_payload_form(&url, &path, context, || {
            format!("component {} version {}", reference.component, version)
        })?;
        let digest = digest::hash(&fetched)?;
        let ancestry = context.ancestry.enter(&digest, &path)?;

        debug!(
            "Resolved component {} {} to {} at {}",
            reference.component, version, digest, path
        );

        let (form, mut records) = self.expand(
            &fetched,
            &path,
            ancestry,
            reference.substitutions.as_ref(),
            context,
            scheduler,
        )?;
        records.insert(
            0,
            ResolutionRecord {
                path,
                target,
                edition: version,
                upgrade: false,
                specified: None,
            },
        );
        Ok((ContentElement::child(form, reference.heading.clone()), records))
    }

    fn resolve_snippet(
        &self,
        reference: &SnippetRef,
        path: Path,
        context: &Context,
        scheduler: &Arc<Scheduler>,
    ) -> Result<Resolved> {
        let url = parse_reference_url(&reference.snippet, &path)?;
        context.check_hostname(&url, &path)?;

        let fetched =
            self.fetch_payload_form(&url, &path, context, || format!("snippet {}", reference.snippet))?;
        let digest = digest::hash(&fetched)?;
        let ancestry = context.ancestry.enter(&digest, &path)?;

        debug!("Resolved snippet {} to {} at {}", reference.snippet, digest, path);

        let (form, records) = self.expand(
            &fetched,
            &path,
            ancestry,
            reference.substitutions.as_ref(),
            context,
            scheduler,
        )?;
        Ok((ContentElement::child(form, reference.heading.clone()), records))
    }

    /// Fetch a component or snippet payload and pull out its form.
    fn fetch_payload_form<D>(
        &self,
        url: &Url,
        path: &Path,
        context: &Context,
        describe: D,
    ) -> Result<Form>
    where
        D: FnOnce() -> String,
    {
        let payload = context
            .caches
            .components
            .get_or_fetch(&[url.as_str()], || self.registry.component(url.as_str()))
            .map_err(|e| e.at_path(path))?
            .ok_or_else(|| Error::NotFound {
                what: describe(),
                path: path.to_string(),
            })?;
        payload_form(payload, url.as_str(), path)
    }

    /// Resolve a fetched form below `path` and apply substitutions.
    fn expand(
        &self,
        fetched: &Form,
        path: &Path,
        ancestry: Ancestry,
        substitutions: Option<&Substitutions>,
        context: &Context,
        scheduler: &Arc<Scheduler>,
    ) -> Result<(Form, Vec<ResolutionRecord>)> {
        let child_context = context.descend(path.form(), ancestry);
        let (form, records) = self.resolve_form(fetched, &child_context, scheduler)?;
        let form = match substitutions {
            Some(substitutions) => self.substituter.substitute(form, substitutions),
            None => form,
        };
        Ok((form, records))
    }
}

fn parse_reference_url(url: &str, path: &Path) -> Result<Url> {
    Url::parse(url).map_err(|e| Error::InvalidReference {
        path: path.to_string(),
        message: format!("{}: {}", url, e),
    })
}

/// The `form` carried by a component or snippet payload.
fn payload_form(payload: Value, source_url: &str, path: &Path) -> Result<Form> {
    let malformed = |message: String| Error::MalformedPayload {
        source_url: source_url.to_string(),
        path: path.to_string(),
        message,
    };

    let Value::Object(mut object) = payload else {
        return Err(malformed("payload is not a JSON object".to_string()));
    };
    match object.remove("form") {
        Some(form @ Value::Object(_)) => {
            Form::from_value(form).map_err(|e| malformed(format!("invalid form: {}", e)))
        }
        Some(_) => Err(malformed("`form` is not an object".to_string())),
        None => Err(malformed("payload has no `form`".to_string())),
    }
}
