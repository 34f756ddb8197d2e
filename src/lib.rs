//! # Form Resolver Library
//!
//! This library resolves composable documents ("forms") whose content may
//! reference other forms published elsewhere. It is the engine behind the
//! `form-resolver` command-line tool but can be embedded in any application
//! that needs to turn a form with references into a fully inlined one.
//!
//! ## Quick Example
//!
//! ```
//! use std::sync::Arc;
//! use form_resolver::compose::{ComposeOptions, Composer};
//! use form_resolver::form::Form;
//! use form_resolver::registry::MemoryRegistry;
//!
//! let mut registry = MemoryRegistry::new();
//! let clause = Form::from_json_str(r#"{"content": ["Be nice."]}"#).unwrap();
//! registry
//!     .publish("api.example.com", "kyle", "rules", "1.0.0", clause)
//!     .unwrap();
//!
//! let form = Form::from_json_str(
//!     r#"{"content": [{"repository": "api.example.com", "publisher": "kyle",
//!                     "project": "rules", "edition": "1.0.0"}]}"#,
//! )
//! .unwrap();
//!
//! let composer = Composer::new(Arc::new(registry));
//! let composition = composer.compose(&form, &ComposeOptions::default()).unwrap();
//! assert!(composition.form.is_fully_inlined());
//! assert_eq!(composition.resolutions.len(), 1);
//! ```
//!
//! ## Core Concepts
//!
//! - **Forms (`form`)**: The document model. Content elements are classified
//!   once, at parse time, into literals, blanks, inline children and the
//!   three reference kinds.
//! - **Editions (`edition`)**: Ordering and compatibility rules used to pick
//!   the edition a reference resolves to.
//! - **Ancestry (`ancestry`, `digest`)**: Content digests of the forms on the
//!   current branch, used to reject reference cycles.
//! - **Caching (`cache`)**: A pluggable request cache in front of every
//!   registry lookup.
//! - **Scheduling (`scheduler`)**: Bounded concurrent resolution of sibling
//!   references with in-order results.
//! - **Registries (`registry`)**: Where publications, forms and components
//!   come from, over HTTP or from memory.
//! - **Composition (`compose`)**: The recursive resolver tying it together.
//! - **Manifests (`manifest`)**: The lockfile of resolution records, which
//!   can be fed back in to reproduce a composition.
//!
//! ## Execution Flow
//!
//! [`compose::Composer::compose`] hashes the root form, then resolves its
//! content depth-first. Each reference is authorized, assigned an edition,
//! looked up, checked against the ancestry, fetched, resolved recursively and
//! substituted, after which it is replaced by an inline child and a
//! resolution record is emitted.

pub mod ancestry;
pub mod cache;
pub mod compose;
pub mod config;
pub mod defaults;
pub mod digest;
pub mod edition;
pub mod error;
pub mod form;
pub mod manifest;
pub mod path;
pub mod registry;
pub mod scheduler;
pub mod substitute;

#[cfg(test)]
mod edition_proptest;
