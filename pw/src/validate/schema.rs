//! Shape validation at document, group and feature level
//!
//! Exhaustive: every problem is reported, nothing stops at the first one.

use serde_json::{Map, Value};
use tracing::debug;

use super::violation::{FieldType, Violation, ViolationKind};
use crate::plan::{DependencyRelation, TestRequirements, type_name};

/// Highest allowed `complexity_level`
pub const MAX_COMPLEXITY: i64 = 3;

struct FieldRule {
    name: &'static str,
    ty: FieldType,
    required: bool,
    /// Arrays must have an element, strings a non-blank character
    non_empty: bool,
}

const fn rule(name: &'static str, ty: FieldType, required: bool, non_empty: bool) -> FieldRule {
    FieldRule {
        name,
        ty,
        required,
        non_empty,
    }
}

const DOCUMENT_RULES: &[FieldRule] = &[
    rule("request", FieldType::String, true, false),
    rule("feature_groups", FieldType::Array, true, true),
];

const GROUP_RULES: &[FieldRule] = &[
    rule("name", FieldType::String, true, true),
    rule("description", FieldType::String, false, false),
    rule("features", FieldType::Array, true, true),
];

const FEATURE_RULES: &[FieldRule] = &[
    rule("name", FieldType::String, true, true),
    rule("description", FieldType::String, true, false),
    rule("complexity_level", FieldType::Integer, true, false),
    rule("files_affected", FieldType::Array, true, false),
    rule("implementation_steps", FieldType::Array, true, true),
    rule("test_requirements", FieldType::Object, true, false),
    rule("dependencies", FieldType::Object, true, false),
    rule("risk_assessment", FieldType::Object, true, false),
    rule("system_design", FieldType::Object, true, false),
];

const STEP_RULES: &[FieldRule] = &[
    rule("step_id", FieldType::String, true, true),
    rule("description", FieldType::String, true, false),
];

const TEST_RULES: &[FieldRule] = &[
    rule("name", FieldType::String, true, true),
    rule("description", FieldType::String, false, false),
    rule("target_element", FieldType::String, false, false),
    rule("target_element_id", FieldType::String, false, false),
    rule("step_ref", FieldType::String, false, false),
];

const DEPENDENCY_RULES: &[FieldRule] = &[
    rule("internal", FieldType::Array, false, false),
    rule("external", FieldType::Array, false, false),
    rule("features", FieldType::Array, false, false),
];

const FEATURE_DEPENDENCY_RULES: &[FieldRule] = &[
    rule("feature", FieldType::String, true, true),
    rule("relation", FieldType::String, false, false),
];

const RISK_RULES: &[FieldRule] = &[
    rule("critical_files", FieldType::Array, false, false),
    rule("potential_regressions", FieldType::Array, false, false),
    rule("mitigations", FieldType::Array, false, false),
    rule("security_concerns", FieldType::Array, false, false),
];

const DESIGN_RULES: &[FieldRule] = &[
    rule("overview", FieldType::String, true, false),
    rule("code_elements", FieldType::Array, true, false),
    rule("data_flow", FieldType::Array, false, false),
    rule("key_algorithms", FieldType::Array, false, false),
];

const ELEMENT_RULES: &[FieldRule] = &[
    rule("name", FieldType::String, true, true),
    rule("element_id", FieldType::String, false, false),
    rule("element_type", FieldType::String, false, false),
    rule("file_path", FieldType::String, false, false),
    rule("purpose", FieldType::String, false, false),
];

/// Lists whose items must all be strings, per nesting level
const FEATURE_STRING_LISTS: &[&str] = &["files_affected"];
const DEPENDENCY_STRING_LISTS: &[&str] = &["internal", "external"];
const RISK_STRING_LISTS: &[&str] = &["critical_files", "potential_regressions", "mitigations", "security_concerns"];
const DESIGN_STRING_LISTS: &[&str] = &["data_flow", "key_algorithms"];

fn describe(path: &str) -> &str {
    if path.is_empty() { "document" } else { path }
}

fn check_fields(obj: &Map<String, Value>, path: &str, rules: &[FieldRule], out: &mut Vec<Violation>) {
    for rule in rules {
        let Some(value) = obj.get(rule.name) else {
            if rule.required {
                out.push(Violation::new(
                    ViolationKind::MissingField {
                        path: path.to_string(),
                        field: rule.name.to_string(),
                        expected: rule.ty,
                    },
                    format!("Missing required field '{}' in {}", rule.name, describe(path)),
                ));
            }
            continue;
        };

        if !rule.ty.matches(value) {
            out.push(Violation::new(
                ViolationKind::WrongType {
                    path: path.to_string(),
                    field: rule.name.to_string(),
                    expected: rule.ty,
                },
                format!(
                    "Field '{}' in {} must be {}, found {}",
                    rule.name,
                    describe(path),
                    rule.ty,
                    type_name(value)
                ),
            ));
            continue;
        }

        if !rule.non_empty {
            continue;
        }
        match value {
            Value::Array(items) if items.is_empty() => out.push(Violation::new(
                ViolationKind::EmptySequence {
                    path: path.to_string(),
                    field: rule.name.to_string(),
                },
                format!("Field '{}' in {} must not be empty", rule.name, describe(path)),
            )),
            Value::String(s) if s.trim().is_empty() => out.push(Violation::new(
                ViolationKind::BlankText {
                    path: path.to_string(),
                    field: rule.name.to_string(),
                },
                format!("Field '{}' in {} must not be blank", rule.name, describe(path)),
            )),
            _ => {}
        }
    }
}

/// Check each object in `obj[field]` against `rules`
fn check_items(obj: &Map<String, Value>, path: &str, field: &str, rules: &[FieldRule], out: &mut Vec<Violation>) {
    let Some(items) = obj.get(field).and_then(Value::as_array) else {
        return;
    };
    for (idx, item) in items.iter().enumerate() {
        let item_path = format!("{}/{}/{}", path, field, idx);
        match item.as_object() {
            Some(item_obj) => check_fields(item_obj, &item_path, rules, out),
            None => out.push(not_an_object(&item_path)),
        }
    }
}

/// Check the object at `obj[field]` against `rules`, if it is one
fn check_nested<'a>(
    obj: &'a Map<String, Value>,
    path: &str,
    field: &str,
    rules: &[FieldRule],
    out: &mut Vec<Violation>,
) -> Option<(&'a Map<String, Value>, String)> {
    let nested = obj.get(field)?.as_object()?;
    let nested_path = format!("{}/{}", path, field);
    check_fields(nested, &nested_path, rules, out);
    Some((nested, nested_path))
}

fn check_string_items(obj: &Map<String, Value>, path: &str, fields: &[&str], out: &mut Vec<Violation>) {
    for field in fields {
        let Some(items) = obj.get(*field).and_then(Value::as_array) else {
            continue;
        };
        for (index, item) in items.iter().enumerate().filter(|(_, item)| !item.is_string()) {
            out.push(Violation::new(
                ViolationKind::WrongItemType {
                    path: path.to_string(),
                    field: field.to_string(),
                    index,
                    expected: FieldType::String,
                },
                format!(
                    "Item {} of '{}' in {} must be a string, found {}",
                    index,
                    field,
                    describe(path),
                    type_name(item)
                ),
            ));
        }
    }
}

fn check_relations(deps: &Map<String, Value>, deps_path: &str, out: &mut Vec<Violation>) {
    let Some(items) = deps.get("features").and_then(Value::as_array) else {
        return;
    };
    for (idx, item) in items.iter().enumerate() {
        let Some(relation) = item.get("relation").and_then(Value::as_str) else {
            continue;
        };
        if !DependencyRelation::NAMES.contains(&relation) {
            let path = format!("{}/features/{}", deps_path, idx);
            out.push(Violation::new(
                ViolationKind::InvalidChoice {
                    path: path.clone(),
                    field: "relation".to_string(),
                    value: relation.to_string(),
                },
                format!(
                    "Unknown relation '{}' in {}; expected one of {}",
                    relation,
                    path,
                    DependencyRelation::NAMES.join(", ")
                ),
            ));
        }
    }
}

fn not_an_object(path: &str) -> Violation {
    Violation::new(
        ViolationKind::NotAnObject { path: path.to_string() },
        format!("Expected an object at {}", describe(path)),
    )
}

fn check_feature(feature: &Map<String, Value>, path: &str, out: &mut Vec<Violation>) {
    check_fields(feature, path, FEATURE_RULES, out);
    check_string_items(feature, path, FEATURE_STRING_LISTS, out);

    // Integers past i64::MAX are out of range too
    let level = feature
        .get("complexity_level")
        .filter(|v| FieldType::Integer.matches(v))
        .map(|v| v.as_i64().unwrap_or(i64::MAX));
    if let Some(level) = level
        && !(0..=MAX_COMPLEXITY).contains(&level)
    {
        out.push(Violation::new(
            ViolationKind::OutOfRange {
                path: path.to_string(),
                field: "complexity_level".to_string(),
                min: 0,
                max: MAX_COMPLEXITY,
            },
            format!("complexity_level {} in {} is outside 0..={}", level, path, MAX_COMPLEXITY),
        ));
    }

    check_items(feature, path, "implementation_steps", STEP_RULES, out);

    if let Some((tests, tests_path)) = check_nested(feature, path, "test_requirements", &[], out) {
        for kind in TestRequirements::KINDS {
            check_fields(tests, &tests_path, &[rule(kind, FieldType::Array, false, false)], out);
            check_items(tests, &tests_path, kind, TEST_RULES, out);
        }
    }

    if let Some((deps, deps_path)) = check_nested(feature, path, "dependencies", DEPENDENCY_RULES, out) {
        check_string_items(deps, &deps_path, DEPENDENCY_STRING_LISTS, out);
        check_items(deps, &deps_path, "features", FEATURE_DEPENDENCY_RULES, out);
        check_relations(deps, &deps_path, out);
    }

    if let Some((risk, risk_path)) = check_nested(feature, path, "risk_assessment", RISK_RULES, out) {
        check_string_items(risk, &risk_path, RISK_STRING_LISTS, out);
    }

    if let Some((design, design_path)) = check_nested(feature, path, "system_design", DESIGN_RULES, out) {
        check_string_items(design, &design_path, DESIGN_STRING_LISTS, out);
        check_items(design, &design_path, "code_elements", ELEMENT_RULES, out);
    }
}

/// Validate the shape of a planning document
pub fn validate(doc: &Value) -> Vec<Violation> {
    debug!("validate: called");
    let mut out = Vec::new();
    let Some(root) = doc.as_object() else {
        out.push(not_an_object(""));
        return out;
    };
    check_fields(root, "", DOCUMENT_RULES, &mut out);

    let groups = root.get("feature_groups").and_then(Value::as_array).into_iter().flatten();
    for (g, group) in groups.enumerate() {
        let group_path = format!("/feature_groups/{}", g);
        let Some(group_obj) = group.as_object() else {
            out.push(not_an_object(&group_path));
            continue;
        };
        check_fields(group_obj, &group_path, GROUP_RULES, &mut out);

        let features = group_obj.get("features").and_then(Value::as_array).into_iter().flatten();
        for (f, feature) in features.enumerate() {
            let feature_path = format!("{}/features/{}", group_path, f);
            match feature.as_object() {
                Some(feature_obj) => check_feature(feature_obj, &feature_path, &mut out),
                None => out.push(not_an_object(&feature_path)),
            }
        }
    }

    debug!(violations = out.len(), "validate: done");
    out
}
