//! Planning document validation
//!
//! Three independent checks, each returning a list of typed [`Violation`]s:
//! - [`validate`]: shape and types at document, group and feature level
//! - [`check_references`]: dependencies and test links resolve in-document
//! - [`check_content`]: unsafe text, coverage gaps, step proportionality
//!
//! Violations are data; nothing here returns an error.

use serde_json::Value;
use tracing::debug;

mod content;
mod references;
mod schema;
mod summary;
mod violation;

#[cfg(test)]
pub(crate) mod testing;

pub use content::{SECURITY_TERMS, UNSAFE_PATTERNS, check_content, find_unsafe, step_range};
pub use references::check_references;
pub use schema::{MAX_COMPLEXITY, validate};
pub use summary::{counts, summarize};
pub use violation::{Category, FieldType, Locator, Violation, ViolationKind};

/// Run every check; the document is valid when this is empty
pub fn validate_all(doc: &Value) -> Vec<Violation> {
    debug!("validate_all: called");
    let mut violations = validate(doc);
    violations.extend(check_references(doc));
    violations.extend(check_content(doc));
    violations
}

/// Violation for a reply that held no JSON object
pub fn unparseable(reason: impl Into<String>) -> Violation {
    let reason = reason.into();
    let message = format!("Reply is not a JSON document: {}", reason);
    Violation::new(ViolationKind::Unparseable { reason }, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::testing::{feature_mut, valid_document};
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_validate_all_clean() {
        assert!(validate_all(&valid_document()).is_empty());
    }

    #[test]
    fn test_validate_all_combines_checks() {
        let mut doc = valid_document();
        feature_mut(&mut doc, 0, 0).as_object_mut().unwrap().remove("files_affected");
        feature_mut(&mut doc, 0, 1)["dependencies"]["features"][0]["feature"] = json!("Nope");
        feature_mut(&mut doc, 0, 1)["system_design"]["overview"] = json!("drop table users first");

        let categories: Vec<Category> = validate_all(&doc).iter().map(Violation::category).collect();
        assert_eq!(
            categories,
            vec![
                Category::SchemaStructure,
                Category::ReferenceIntegrity,
                Category::ContentSafety
            ]
        );
    }

    #[test]
    fn test_valid_document_deserializes() {
        let doc = crate::plan::to_document(&valid_document()).unwrap();
        assert_eq!(doc.feature_count(), 2);
    }

    /// Pointers into the fixture that mutations overwrite or remove
    const MUTATION_POINTERS: &[&str] = &[
        "/request",
        "/feature_groups/0/name",
        "/feature_groups/0/description",
        "/feature_groups/0/features/0/name",
        "/feature_groups/0/features/0/description",
        "/feature_groups/0/features/0/complexity_level",
        "/feature_groups/0/features/0/files_affected",
        "/feature_groups/0/features/0/files_affected/0",
        "/feature_groups/0/features/0/implementation_steps/0",
        "/feature_groups/0/features/0/implementation_steps/1/step_id",
        "/feature_groups/0/features/0/implementation_steps/1/description",
        "/feature_groups/0/features/0/test_requirements/unit_tests/0/name",
        "/feature_groups/0/features/0/test_requirements/unit_tests/0/description",
        "/feature_groups/0/features/0/test_requirements/unit_tests/0/target_element",
        "/feature_groups/0/features/0/test_requirements/unit_tests/0/target_element_id",
        "/feature_groups/0/features/0/test_requirements/unit_tests/0/step_ref",
        "/feature_groups/0/features/0/test_requirements/property_tests",
        "/feature_groups/0/features/0/dependencies/internal",
        "/feature_groups/0/features/0/dependencies/internal/0",
        "/feature_groups/0/features/0/risk_assessment/mitigations/0",
        "/feature_groups/0/features/0/risk_assessment/security_concerns",
        "/feature_groups/0/features/0/system_design/overview",
        "/feature_groups/0/features/0/system_design/code_elements/0/element_id",
        "/feature_groups/0/features/0/system_design/code_elements/0/element_type",
        "/feature_groups/0/features/0/system_design/code_elements/0/file_path",
        "/feature_groups/0/features/0/system_design/code_elements/0/purpose",
        "/feature_groups/0/features/0/system_design/data_flow/0",
        "/feature_groups/0/features/0/system_design/key_algorithms",
        "/feature_groups/0/features/1/dependencies/features/0",
        "/feature_groups/0/features/1/dependencies/features/0/feature",
        "/feature_groups/0/features/1/dependencies/features/0/relation",
        "/feature_groups/0/features/1/test_requirements/integration_tests/0/name",
    ];

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            any::<u64>().prop_map(Value::from),
            (-1.0e6..1.0e6f64).prop_map(|f| json!(f)),
            "[a-zA-Z_ ]{0,12}".prop_map(Value::from),
            prop::sample::select(crate::plan::DependencyRelation::NAMES.to_vec()).prop_map(Value::from),
        ];
        leaf.prop_recursive(2, 8, 3, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..3).prop_map(Value::Array),
                prop::collection::btree_map("[a-z_]{1,6}", inner, 0..3)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    /// Overwrite the value at a pointer, or remove it when `value` is `None`
    fn mutate(doc: &mut Value, pointer: &str, value: Option<Value>) {
        match value {
            Some(value) => {
                if let Some(slot) = doc.pointer_mut(pointer) {
                    *slot = value;
                }
            }
            None => {
                let Some((parent, key)) = pointer.rsplit_once('/') else {
                    return;
                };
                match doc.pointer_mut(parent) {
                    Some(Value::Object(obj)) => {
                        obj.remove(key);
                    }
                    Some(Value::Array(items)) => {
                        if let Ok(idx) = key.parse::<usize>()
                            && idx < items.len()
                        {
                            items.remove(idx);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    proptest! {
        #[test]
        fn prop_clean_document_always_deserializes(
            mutations in prop::collection::vec(
                (prop::sample::select(MUTATION_POINTERS.to_vec()), prop::option::of(arb_value())),
                1..4,
            )
        ) {
            let mut doc = valid_document();
            for (pointer, value) in mutations {
                mutate(&mut doc, pointer, value);
            }
            if validate_all(&doc).is_empty() {
                let typed = crate::plan::to_document(&doc);
                prop_assert!(typed.is_ok(), "{:?} for {}", typed.err(), doc);
            }
        }
    }
}
