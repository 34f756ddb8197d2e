//! Term and heading substitution in resolved sub-forms
//!
//! After a referenced form has been resolved, the referencing element may
//! rename defined terms and headings inside it. [`TermSubstitution`] is the
//! default engine: it rewrites `use` and `definition` markup for terms, and
//! `reference` markup and child headings for headings, at every depth.

use serde_json::Value;

use crate::form::{ContentElement, Form, Substitutions};

/// Applies a reference's substitutions to its resolved form.
pub trait Substitute: Send + Sync {
    fn substitute(&self, form: Form, substitutions: &Substitutions) -> Form;
}

/// Default substitution engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermSubstitution;

impl Substitute for TermSubstitution {
    fn substitute(&self, form: Form, substitutions: &Substitutions) -> Form {
        if substitutions.is_empty() {
            return form;
        }
        let Form { content, metadata } = form;
        Form {
            content: content
                .into_iter()
                .map(|element| substitute_element(element, substitutions))
                .collect(),
            metadata,
        }
    }
}

fn substitute_element(element: ContentElement, substitutions: &Substitutions) -> ContentElement {
    match element {
        ContentElement::Literal(Value::Object(mut object)) => {
            for (key, table) in [
                ("use", &substitutions.terms),
                ("definition", &substitutions.terms),
                ("reference", &substitutions.headings),
            ] {
                let replacement = match object.get(key) {
                    Some(Value::String(current)) => table.get(current).cloned(),
                    _ => None,
                };
                if let Some(replacement) = replacement {
                    object.insert(key.to_string(), Value::String(replacement));
                }
            }
            ContentElement::Literal(Value::Object(object))
        }
        ContentElement::Child(mut child) => {
            if let Some(heading) = &child.heading {
                if let Some(replacement) = substitutions.headings.get(heading) {
                    child.heading = Some(replacement.clone());
                }
            }
            child.form = TermSubstitution.substitute(child.form, substitutions);
            ContentElement::Child(child)
        }
        other => other,
    }
}
