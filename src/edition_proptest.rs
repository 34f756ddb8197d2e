//! Property-based tests for edition selection, digests and composition.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use std::cmp::Ordering;
    use std::sync::Arc;

    use crate::compose::{ComposeOptions, Composer};
    use crate::digest;
    use crate::edition::{
        latest_compatible, EditionStrategy, ReviewersEdition, ReviewersEditionStrategy,
        SemverStrategy,
    };
    use crate::form::Form;
    use crate::path::Path;
    use crate::registry::MemoryRegistry;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn semver_edition() -> impl Strategy<Value = String> {
        (0u64..4, 0u64..6, 0u64..6).prop_map(|(major, minor, patch)| {
            format!("{}.{}.{}", major, minor, patch)
        })
    }

    fn reviewers_edition() -> impl Strategy<Value = String> {
        (1u64..4, proptest::option::of(1u64..4), proptest::option::of(1u64..3)).prop_map(
            |(edition, update, draft)| {
                let mut value = format!("{}e", edition);
                if let Some(update) = update {
                    value.push_str(&format!("{}u", update));
                }
                if let Some(draft) = draft {
                    value.push_str(&format!("{}d", draft));
                }
                value
            },
        )
    }

    fn literal() -> impl Strategy<Value = Value> {
        prop_oneof![
            "[a-zA-Z .,]{0,16}".prop_map(Value::String),
            "[A-Z][a-z]{1,8}".prop_map(|term| json!({"use": term})),
            "[A-Z][a-z]{1,8}".prop_map(|term| json!({"definition": term})),
            Just(json!({"blank": ""})),
        ]
    }

    // ============================================================================
    // Edition selection
    // ============================================================================

    proptest! {
        /// Property: the semver order is antisymmetric
        #[test]
        fn semver_compare_is_antisymmetric(a in semver_edition(), b in semver_edition()) {
            let strategy = SemverStrategy;
            prop_assert_eq!(strategy.compare(&a, &b), strategy.compare(&b, &a).reverse());
        }

        /// Property: the chosen edition is compatible and no compatible
        /// candidate is greater
        #[test]
        fn latest_compatible_is_the_maximum(
            requested in semver_edition(),
            available in prop::collection::vec(semver_edition(), 0..12),
        ) {
            let strategy = SemverStrategy;
            let chosen = latest_compatible(&strategy, &requested, &available);
            let candidates: Vec<&String> = available
                .iter()
                .filter(|edition| **edition == requested || strategy.compatible(&requested, edition))
                .collect();

            match chosen {
                None => prop_assert!(candidates.is_empty()),
                Some(chosen) => {
                    prop_assert!(candidates.contains(&chosen));
                    for candidate in candidates {
                        prop_assert_ne!(strategy.compare(candidate, chosen), Ordering::Greater);
                    }
                }
            }
        }

        /// Property: an upgrade never moves to a different major version
        #[test]
        fn semver_upgrade_keeps_major(requested in "[1-3]\\.[0-5]\\.[0-5]", candidate in semver_edition()) {
            if SemverStrategy.compatible(&requested, &candidate) {
                prop_assert_eq!(requested.split('.').next(), candidate.split('.').next());
            }
        }

        /// Property: every generated reviewers edition parses
        #[test]
        fn reviewers_editions_parse(edition in reviewers_edition()) {
            prop_assert!(ReviewersEdition::parse(&edition).is_some());
        }

        /// Property: drafts are never an upgrade target
        #[test]
        fn drafts_are_never_compatible(requested in reviewers_edition(), candidate in reviewers_edition()) {
            let parsed = ReviewersEdition::parse(&candidate);
            if parsed.is_some_and(|edition| edition.is_draft()) {
                prop_assert!(!ReviewersEditionStrategy.compatible(&requested, &candidate));
            }
        }
    }

    // ============================================================================
    // Digests and paths
    // ============================================================================

    proptest! {
        /// Property: digests ignore the order metadata keys were written in
        #[test]
        fn digest_ignores_key_order(first in "[a-z]{1,8}", second in "[A-Z]{1,8}") {
            let forward = Form::from_json_str(&format!(
                r#"{{"alpha": "{}", "content": ["x"], "omega": "{}"}}"#,
                first, second
            )).unwrap();
            let backward = Form::from_json_str(&format!(
                r#"{{"omega": "{}", "content": ["x"], "alpha": "{}"}}"#,
                second, first
            )).unwrap();
            prop_assert_eq!(digest::hash(&forward).unwrap(), digest::hash(&backward).unwrap());
        }

        /// Property: digests are 64 lowercase hex characters
        #[test]
        fn digest_is_hex(text in ".{0,32}") {
            let form = Form::from_value(json!({"content": [text]})).unwrap();
            let digest = digest::hash(&form).unwrap();
            prop_assert_eq!(digest.as_str().len(), 64);
            prop_assert!(digest.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }

        /// Property: a path's display has one component per segment
        #[test]
        fn path_display_matches_segments(indexes in prop::collection::vec(0usize..20, 1..6)) {
            let mut path = Path::root();
            for (position, index) in indexes.iter().enumerate() {
                if position > 0 {
                    path = path.form();
                }
                path = path.content(*index);
            }
            let rendered = path.to_string();
            prop_assert_eq!(rendered.split('/').count(), path.segments().len());
        }
    }

    // ============================================================================
    // Composition
    // ============================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Property: forms without references compose to themselves without
        /// touching the registry
        #[test]
        fn literal_only_forms_are_unchanged(
            content in prop::collection::vec(literal(), 0..10),
            limit in 1usize..4,
        ) {
            let form = Form::from_value(json!({"content": content})).unwrap();
            let registry = Arc::new(MemoryRegistry::new());
            let composer = Composer::new(registry.clone());
            let options = ComposeOptions { limit, ..ComposeOptions::default() };

            let composition = composer.compose(&form, &options).unwrap();
            prop_assert_eq!(composition.form, form);
            prop_assert!(composition.resolutions.is_empty());
            prop_assert_eq!(registry.call_count(), 0);
        }
    }
}
