//! Repair engine
//!
//! Applies deterministic fixes for violations whose kind allows one. Works on
//! a private copy; the caller's document is never touched. Callers must
//! re-validate the result.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

mod defaults;

pub use defaults::{REMOVABLE_FIELDS, default_for};

use crate::plan::ensure_element_ids;
use crate::validate::{FieldType, Violation, ViolationKind};

/// Replacement text for unsafe operations
pub const SANITIZED_PLACEHOLDER: &str = "[unsafe operation removed]";

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());

/// Result of one repair pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairOutcome {
    pub document: Value,
    /// At least one concrete edit was applied
    pub changed: bool,
    /// One line per applied edit
    pub applied: Vec<String>,
    /// Violations with no deterministic fix
    pub skipped: usize,
}

fn object_at<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Map<String, Value>> {
    doc.pointer_mut(path).and_then(Value::as_object_mut)
}

/// Fix a missing or mistyped field with its default
///
/// Optional links with no sensible default are removed instead.
fn fill_default(doc: &mut Value, path: &str, field: &str, expected: FieldType) -> Option<String> {
    let default = default_for(path, field, expected);
    let obj = object_at(doc, path)?;
    if obj.get(field).is_some_and(|v| expected.matches(v)) {
        return None;
    }
    match default {
        Some(value) => {
            obj.insert(field.to_string(), value);
            Some(format!("Inserted default for '{}' at {}", field, display(path)))
        }
        None if REMOVABLE_FIELDS.contains(&field) => {
            obj.remove(field)?;
            Some(format!("Removed mistyped '{}' at {}", field, display(path)))
        }
        None => None,
    }
}

/// Replace a value outside its fixed set with the field's default
fn reset_choice(doc: &mut Value, path: &str, field: &str, value: &str) -> Option<String> {
    let default = default_for(path, field, FieldType::String)?;
    let obj = object_at(doc, path)?;
    if obj.get(field).and_then(Value::as_str) != Some(value) {
        return None;
    }
    obj.insert(field.to_string(), default.clone());
    Some(format!("Replaced '{}' with {} for '{}' at {}", value, default, field, path))
}

/// Drop list items of the wrong type
fn drop_items(doc: &mut Value, path: &str, field: &str, expected: FieldType) -> Option<String> {
    let items = object_at(doc, path)?.get_mut(field)?.as_array_mut()?;
    let before = items.len();
    items.retain(|item| expected.matches(item));
    let dropped = before - items.len();
    (dropped > 0).then(|| format!("Dropped {} non-{} item(s) from '{}' at {}", dropped, expected, field, display(path)))
}

fn clamp_field(doc: &mut Value, path: &str, field: &str, min: i64, max: i64) -> Option<String> {
    let obj = object_at(doc, path)?;
    let value = obj.get(field)?;
    let current = value.as_i64().or_else(|| value.as_u64().map(|_| i64::MAX))?;
    let clamped = current.clamp(min, max);
    if clamped == current {
        return None;
    }
    obj.insert(field.to_string(), Value::from(clamped));
    Some(format!("Clamped '{}' from {} to {} at {}", field, current, clamped, display(path)))
}

/// Drop feature dependencies naming `target`
fn remove_dependency(doc: &mut Value, path: &str, target: &str) -> Option<String> {
    let deps = doc
        .pointer_mut(&format!("{}/dependencies/features", path))
        .and_then(Value::as_array_mut)?;
    let before = deps.len();
    deps.retain(|d| d.get("feature").and_then(Value::as_str).map(str::trim) != Some(target));
    (deps.len() != before).then(|| format!("Removed dangling dependency on '{}' at {}", target, path))
}

fn clear_fields(doc: &mut Value, path: &str, fields: &[&str]) -> Option<String> {
    let obj = object_at(doc, path)?;
    let removed: Vec<&str> = fields.iter().copied().filter(|f| obj.remove(*f).is_some()).collect();
    (!removed.is_empty()).then(|| format!("Cleared {} at {}", removed.join(", "), path))
}

fn sanitize(doc: &mut Value, path: &str, pattern: &str) -> Option<String> {
    let target = doc.pointer_mut(path)?;
    let re = Regex::new(&format!("(?i){}", regex::escape(pattern))).ok()?;
    let replaced = {
        let text = target.as_str()?;
        if !re.is_match(text) {
            return None;
        }
        let stripped = re.replace_all(text, SANITIZED_PLACEHOLDER);
        WHITESPACE_RUN.replace_all(&stripped, " ").into_owned()
    };
    *target = Value::String(replaced);
    Some(format!("Sanitized '{}' at {}", pattern, path))
}

fn display(path: &str) -> &str {
    if path.is_empty() { "document" } else { path }
}

/// Apply one violation's fix; `None` when nothing was edited
fn apply(doc: &mut Value, kind: &ViolationKind) -> Option<String> {
    match kind {
        ViolationKind::MissingField { path, field, expected } | ViolationKind::WrongType { path, field, expected } => {
            fill_default(doc, path, field, *expected)
        }
        ViolationKind::OutOfRange { path, field, min, max } => clamp_field(doc, path, field, *min, *max),
        ViolationKind::WrongItemType { path, field, expected, .. } => drop_items(doc, path, field, *expected),
        ViolationKind::InvalidChoice { path, field, value } => reset_choice(doc, path, field, value),
        ViolationKind::DanglingDependency { path, target } => remove_dependency(doc, path, target),
        ViolationKind::DanglingTestTarget { path, field, .. } => clear_fields(doc, path, &[field.as_str()]),
        ViolationKind::MismatchedTestTarget { target, .. } => {
            let report = ensure_element_ids(doc);
            (report.linked > 0).then(|| format!("Relinked tests of '{}' to its element id", target))
        }
        ViolationKind::DanglingStepRef { path, .. } => clear_fields(doc, path, &["step_ref"]),
        ViolationKind::DuplicateElementId { id } => {
            let report = ensure_element_ids(doc);
            (report.renamed > 0).then(|| format!("Renamed duplicate element id '{}'", id))
        }
        ViolationKind::UnsafeContent { path, pattern } => sanitize(doc, path, pattern),
        ViolationKind::Unparseable { .. }
        | ViolationKind::NotAnObject { .. }
        | ViolationKind::EmptySequence { .. }
        | ViolationKind::BlankText { .. }
        | ViolationKind::MissingTests { .. }
        | ViolationKind::MissingSecurityTest { .. }
        | ViolationKind::MissingSecurityConcerns { .. }
        | ViolationKind::UnderSpecified { .. }
        | ViolationKind::OverSpecified { .. } => None,
    }
}

/// Removals shift array indices, so they run after in-place edits
fn is_removal(kind: &ViolationKind) -> bool {
    matches!(
        kind,
        ViolationKind::DanglingDependency { .. } | ViolationKind::WrongItemType { .. }
    )
}

/// Repair a copy of `doc` for the given violations
pub fn repair(doc: &Value, violations: &[Violation]) -> RepairOutcome {
    debug!(violations = violations.len(), "repair: called");
    let mut document = doc.clone();
    let mut applied = Vec::new();
    let mut skipped = 0;

    let ordered = violations
        .iter()
        .filter(|v| !is_removal(&v.kind))
        .chain(violations.iter().filter(|v| is_removal(&v.kind)));

    for violation in ordered {
        match apply(&mut document, &violation.kind) {
            Some(action) => {
                debug!(%action, "repair: applied");
                applied.push(action);
            }
            None => skipped += 1,
        }
    }

    let changed = !applied.is_empty();
    if changed {
        info!(applied = applied.len(), skipped, "Repair pass changed document");
    }
    RepairOutcome {
        document,
        changed,
        applied,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::testing::{feature_mut, valid_document};
    use crate::validate::{check_content, check_references, validate, validate_all};
    use serde_json::json;

    #[test]
    fn test_missing_field_repaired_in_one_pass() {
        let mut doc = valid_document();
        feature_mut(&mut doc, 0, 0).as_object_mut().unwrap().remove("risk_assessment");
        let violations = validate(&doc);
        assert_eq!(violations.len(), 1);

        let outcome = repair(&doc, &violations);
        assert!(outcome.changed);
        assert!(validate(&outcome.document).is_empty());
        // Input untouched
        assert!(feature_mut(&mut doc, 0, 0).get("risk_assessment").is_none());
    }

    #[test]
    fn test_wrong_type_replaced() {
        let mut doc = valid_document();
        feature_mut(&mut doc, 0, 1)["files_affected"] = json!("src/router.rs");
        let outcome = repair(&doc, &validate(&doc));
        assert!(outcome.changed);
        assert_eq!(outcome.document["feature_groups"][0]["features"][1]["files_affected"], json!([]));
    }

    #[test]
    fn test_dangling_dependency_removed() {
        let mut doc = valid_document();
        feature_mut(&mut doc, 0, 1)["dependencies"]["features"] = json!([
            {"feature": "Ghost feature", "relation": "requires"},
            {"feature": "Cache store", "relation": "requires"}
        ]);
        let violations = check_references(&doc);
        assert_eq!(violations.len(), 1);

        let outcome = repair(&doc, &violations);
        assert!(outcome.changed);
        assert!(check_references(&outcome.document).is_empty());
        let deps = &outcome.document["feature_groups"][0]["features"][1]["dependencies"]["features"];
        assert_eq!(deps, &json!([{"feature": "Cache store", "relation": "requires"}]));
    }

    #[test]
    fn test_dangling_test_links_cleared_not_invented() {
        let mut doc = valid_document();
        let test = &mut feature_mut(&mut doc, 0, 0)["test_requirements"]["unit_tests"][0];
        test["target_element"] = json!("Ghost");
        test["step_ref"] = json!("S42");

        let outcome = repair(&doc, &check_references(&doc));
        assert_eq!(outcome.applied.len(), 2);
        let test = &outcome.document["feature_groups"][0]["features"][0]["test_requirements"]["unit_tests"][0];
        assert!(test.get("target_element").is_none());
        // The id still resolves, so it stays
        assert_eq!(test["target_element_id"], json!("E-1-1-1"));
        assert!(test.get("step_ref").is_none());
        assert!(check_references(&outcome.document).is_empty());
    }

    #[test]
    fn test_only_dangling_id_is_cleared() {
        let mut doc = valid_document();
        feature_mut(&mut doc, 0, 0)["test_requirements"]["unit_tests"][0]["target_element_id"] = json!("E-7-7-7");

        let outcome = repair(&doc, &check_references(&doc));
        assert_eq!(outcome.applied.len(), 1);
        let test = &outcome.document["feature_groups"][0]["features"][0]["test_requirements"]["unit_tests"][0];
        assert_eq!(test["target_element"], json!("LruStore"));
        assert!(test.get("target_element_id").is_none());
        assert!(check_references(&outcome.document).is_empty());
    }

    #[test]
    fn test_mismatched_test_target_relinked() {
        let mut doc = valid_document();
        feature_mut(&mut doc, 0, 0)["test_requirements"]["unit_tests"][0]["target_element_id"] = json!("E-1-2-1");

        let outcome = repair(&doc, &check_references(&doc));
        assert!(outcome.changed);
        let test = &outcome.document["feature_groups"][0]["features"][0]["test_requirements"]["unit_tests"][0];
        assert_eq!(test["target_element_id"], json!("E-1-1-1"));
        assert!(check_references(&outcome.document).is_empty());
    }

    #[test]
    fn test_wrong_list_items_and_relation_repaired() {
        let mut doc = valid_document();
        feature_mut(&mut doc, 0, 0)["files_affected"] = json!([42, "src/cache/store.rs", {"x": 1}]);
        feature_mut(&mut doc, 0, 1)["dependencies"]["features"][0]["relation"] = json!("depends_on");
        let violations = validate(&doc);
        assert_eq!(violations.len(), 3, "{violations:#?}");

        let outcome = repair(&doc, &violations);
        assert!(validate_all(&outcome.document).is_empty());
        assert_eq!(
            outcome.document["feature_groups"][0]["features"][0]["files_affected"],
            json!(["src/cache/store.rs"])
        );
        assert_eq!(
            outcome.document["feature_groups"][0]["features"][1]["dependencies"]["features"][0]["relation"],
            json!("requires")
        );
        assert!(crate::plan::to_document(&outcome.document).is_ok());
    }

    #[test]
    fn test_mistyped_optional_link_removed() {
        let mut doc = valid_document();
        feature_mut(&mut doc, 0, 0)["test_requirements"]["unit_tests"][0]["step_ref"] = json!(2);
        feature_mut(&mut doc, 0, 1)["system_design"]["code_elements"][0]["purpose"] = json!(null);

        let outcome = repair(&doc, &validate(&doc));
        assert_eq!(outcome.applied.len(), 2);
        let feature = &outcome.document["feature_groups"][0]["features"];
        assert!(feature[0]["test_requirements"]["unit_tests"][0].get("step_ref").is_none());
        assert_eq!(feature[1]["system_design"]["code_elements"][0]["purpose"], json!(""));
        assert!(validate(&outcome.document).is_empty());
    }

    #[test]
    fn test_huge_complexity_clamped() {
        let mut doc = valid_document();
        feature_mut(&mut doc, 0, 0)["complexity_level"] = json!(u64::MAX);
        let outcome = repair(&doc, &validate(&doc));
        assert_eq!(outcome.document["feature_groups"][0]["features"][0]["complexity_level"], json!(3));
    }

    #[test]
    fn test_unsafe_text_sanitized() {
        let mut doc = valid_document();
        feature_mut(&mut doc, 0, 0)["description"] = json!("Store entries; on reset run DROP TABLE cache");
        let outcome = repair(&doc, &check_content(&doc));
        assert!(outcome.changed);
        assert_eq!(
            outcome.document["feature_groups"][0]["features"][0]["description"],
            json!("Store entries; on reset run [unsafe operation removed] cache")
        );
        assert!(check_content(&outcome.document).is_empty());
    }

    #[test]
    fn test_duplicate_ids_renamed() {
        let mut doc = valid_document();
        feature_mut(&mut doc, 0, 1)["system_design"]["code_elements"][0]["element_id"] = json!("E-1-1-1");
        let outcome = repair(&doc, &check_references(&doc));
        assert!(outcome.changed);
        assert!(check_references(&outcome.document).is_empty());
    }

    #[test]
    fn test_out_of_range_clamped() {
        let mut doc = valid_document();
        feature_mut(&mut doc, 0, 1)["complexity_level"] = json!(9);
        let outcome = repair(&doc, &validate(&doc));
        assert_eq!(outcome.document["feature_groups"][0]["features"][1]["complexity_level"], json!(3));
        assert!(validate(&outcome.document).is_empty());
    }

    #[test]
    fn test_unrepairable_reports_unchanged() {
        let mut doc = valid_document();
        feature_mut(&mut doc, 0, 0)["test_requirements"] = json!({});
        feature_mut(&mut doc, 0, 1)["complexity_level"] = json!(0);
        feature_mut(&mut doc, 0, 1)["implementation_steps"] = json!([
            {"step_id": "S1", "description": "a"}, {"step_id": "S2", "description": "b"},
            {"step_id": "S3", "description": "c"}, {"step_id": "S4", "description": "d"}
        ]);
        let violations = validate_all(&doc);
        assert!(!violations.is_empty());

        let outcome = repair(&doc, &violations);
        assert!(!outcome.changed);
        assert_eq!(outcome.skipped, violations.len());
        assert_eq!(outcome.document, doc);
    }

    #[test]
    fn test_missing_request_defaulted() {
        let mut doc = valid_document();
        doc.as_object_mut().unwrap().remove("request");
        let outcome = repair(&doc, &validate(&doc));
        assert_eq!(outcome.document["request"], json!(""));
    }
}
