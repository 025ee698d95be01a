//! Default values for missing or mistyped fields

use serde_json::{Value, json};

use crate::validate::FieldType;

const EMPTY_LIST_FIELDS: &[&str] = &[
    "files_affected",
    "code_elements",
    "data_flow",
    "key_algorithms",
    "internal",
    "external",
    "critical_files",
    "potential_regressions",
    "mitigations",
    "security_concerns",
    "unit_tests",
    "integration_tests",
    "property_tests",
    "acceptance_tests",
];

/// Optional fields dropped when mistyped; serde fills them back in
pub const REMOVABLE_FIELDS: &[&str] = &["target_element", "target_element_id", "step_ref", "element_id"];

/// Trailing array index in a pointer like `/a/b/3`
fn trailing_index(path: &str, parent: &str) -> Option<usize> {
    let (head, idx) = path.rsplit_once('/')?;
    if head.ends_with(parent) { idx.parse().ok() } else { None }
}

/// Default for `field` in the object at `path`
///
/// `None` means the field cannot be filled without inventing content
/// (feature names, step lists, feature lists).
pub fn default_for(path: &str, field: &str, expected: FieldType) -> Option<Value> {
    let value = match field {
        "request" => json!(""),
        "description" => json!("No description provided."),
        "overview" => json!("Not specified."),
        "complexity_level" => json!(1),
        "element_type" | "file_path" | "purpose" => json!(""),
        "relation" => json!("requires"),
        "name" => {
            let g = trailing_index(path, "/feature_groups")?;
            json!(format!("Group {}", g + 1))
        }
        "step_id" => {
            let n = trailing_index(path, "/implementation_steps")?;
            json!(format!("S{}", n + 1))
        }
        "features" if path.ends_with("/dependencies") => json!([]),
        "test_requirements" => json!({
            "unit_tests": [],
            "integration_tests": [],
            "property_tests": [],
            "acceptance_tests": []
        }),
        "dependencies" => json!({"internal": [], "external": [], "features": []}),
        "risk_assessment" => json!({
            "critical_files": [],
            "potential_regressions": [],
            "mitigations": [],
            "security_concerns": []
        }),
        "system_design" => json!({
            "overview": "Not specified.",
            "code_elements": [],
            "data_flow": [],
            "key_algorithms": []
        }),
        f if EMPTY_LIST_FIELDS.contains(&f) => json!([]),
        _ => return None,
    };
    expected.matches(&value).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_defaults() {
        assert_eq!(
            default_for("/feature_groups/0/features/0", "complexity_level", FieldType::Integer),
            Some(json!(1))
        );
        assert_eq!(
            default_for("/feature_groups/2", "name", FieldType::String),
            Some(json!("Group 3"))
        );
        assert_eq!(
            default_for("/feature_groups/0/features/0/implementation_steps/4", "step_id", FieldType::String),
            Some(json!("S5"))
        );
    }

    #[test]
    fn test_never_invents_content() {
        assert_eq!(default_for("/feature_groups/0/features/1", "name", FieldType::String), None);
        assert_eq!(default_for("", "feature_groups", FieldType::Array), None);
        assert_eq!(default_for("/feature_groups/0", "features", FieldType::Array), None);
        assert_eq!(
            default_for("/feature_groups/0/features/0", "implementation_steps", FieldType::Array),
            None
        );
    }

    #[test]
    fn test_dependency_feature_list() {
        assert_eq!(
            default_for("/feature_groups/0/features/0/dependencies", "features", FieldType::Array),
            Some(json!([]))
        );
    }

    #[test]
    fn test_default_must_match_expected_type() {
        assert_eq!(default_for("", "request", FieldType::Array), None);
    }

    #[test]
    fn test_element_and_relation_defaults() {
        assert_eq!(
            default_for("/feature_groups/0/features/0/system_design/code_elements/0", "purpose", FieldType::String),
            Some(json!(""))
        );
        assert_eq!(
            default_for("/feature_groups/0/features/0/dependencies/features/0", "relation", FieldType::String),
            Some(json!("requires"))
        );
        assert_eq!(default_for("", "step_ref", FieldType::String), None);
    }
}
