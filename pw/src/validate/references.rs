//! Cross-reference checks
//!
//! Pass one collects what the document declares: feature names, step ids per
//! feature, code element names and ids. Pass two flags every reference that
//! does not resolve against those sets, and tests whose element name and id
//! point at different elements.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::debug;

use super::violation::{Violation, ViolationKind};
use crate::plan::{FeatureKey, TestRequirements, feature_pointer, features};

#[derive(Debug, Default)]
struct Declarations<'a> {
    feature_names: HashSet<&'a str>,
    steps: HashMap<FeatureKey, HashSet<&'a str>>,
    /// Element name to the ids declared under that name
    elements: HashMap<&'a str, HashSet<&'a str>>,
    element_ids: HashSet<&'a str>,
    duplicate_ids: Vec<&'a str>,
}

fn str_field<'a>(obj: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    obj.get(field).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

fn objects<'a>(
    obj: &'a Map<String, Value>,
    path: &[&str],
) -> impl Iterator<Item = (usize, &'a Map<String, Value>)> + use<'a> {
    let mut current = Some(obj);
    let mut array = None;
    for (i, key) in path.iter().enumerate() {
        let value = current.and_then(|o| o.get(*key));
        if i + 1 == path.len() {
            array = value.and_then(Value::as_array);
        } else {
            current = value.and_then(Value::as_object);
        }
    }
    array
        .into_iter()
        .flatten()
        .enumerate()
        .filter_map(|(i, v)| v.as_object().map(|o| (i, o)))
}

fn declarations(doc: &Value) -> Declarations<'_> {
    let mut decl = Declarations::default();
    for (key, feature) in features(doc) {
        if let Some(name) = str_field(feature, "name") {
            decl.feature_names.insert(name);
        }
        let steps = decl.steps.entry(key).or_default();
        for (_, step) in objects(feature, &["implementation_steps"]) {
            if let Some(id) = str_field(step, "step_id") {
                steps.insert(id);
            }
        }
        for (_, element) in objects(feature, &["system_design", "code_elements"]) {
            let id = str_field(element, "element_id");
            if let Some(name) = str_field(element, "name") {
                let ids = decl.elements.entry(name).or_default();
                ids.extend(id);
            }
            if let Some(id) = id
                && !decl.element_ids.insert(id)
            {
                decl.duplicate_ids.push(id);
            }
        }
    }
    decl
}

/// Flag references that do not resolve within the document
pub fn check_references(doc: &Value) -> Vec<Violation> {
    debug!("check_references: called");
    let decl = declarations(doc);
    let mut out = Vec::new();

    for id in &decl.duplicate_ids {
        out.push(Violation::new(
            ViolationKind::DuplicateElementId { id: id.to_string() },
            format!("Element id '{}' is declared more than once", id),
        ));
    }

    for (key, feature) in features(doc) {
        let path = feature_pointer(key);
        let feature_name = str_field(feature, "name").unwrap_or("<unnamed>");

        for (_, dep) in objects(feature, &["dependencies", "features"]) {
            let Some(target) = str_field(dep, "feature") else {
                continue;
            };
            if !decl.feature_names.contains(target) {
                out.push(Violation::new(
                    ViolationKind::DanglingDependency {
                        path: path.clone(),
                        target: target.to_string(),
                    },
                    format!("Feature '{}' depends on unknown feature '{}'", feature_name, target),
                ));
            }
        }

        let steps = decl.steps.get(&key);
        for kind in TestRequirements::KINDS {
            for (idx, test) in objects(feature, &["test_requirements", kind]) {
                let test_path = format!("{}/test_requirements/{}/{}", path, kind, idx);
                let test_name = str_field(test, "name").unwrap_or("<unnamed>");

                let target = str_field(test, "target_element");
                let target_id = str_field(test, "target_element_id");
                let named_ids = target.and_then(|name| decl.elements.get(name));
                let id_known = target_id.is_some_and(|id| decl.element_ids.contains(id));

                for (field, value, known) in [
                    ("target_element", target, named_ids.is_some()),
                    ("target_element_id", target_id, id_known),
                ] {
                    if let Some(value) = value
                        && !known
                    {
                        out.push(Violation::new(
                            ViolationKind::DanglingTestTarget {
                                path: test_path.clone(),
                                field: field.to_string(),
                                target: value.to_string(),
                            },
                            format!("Test '{}' targets unknown element '{}'", test_name, value),
                        ));
                    }
                }

                if let (Some(name), Some(ids), Some(id)) = (target, named_ids, target_id)
                    && id_known
                    && !ids.contains(id)
                {
                    out.push(Violation::new(
                        ViolationKind::MismatchedTestTarget {
                            path: test_path.clone(),
                            target: name.to_string(),
                            id: id.to_string(),
                        },
                        format!(
                            "Test '{}' names element '{}' but carries the id of another element '{}'",
                            test_name, name, id
                        ),
                    ));
                }

                if let Some(step) = str_field(test, "step_ref")
                    && !steps.is_some_and(|s| s.contains(step))
                {
                    out.push(Violation::new(
                        ViolationKind::DanglingStepRef {
                            path: test_path,
                            step: step.to_string(),
                        },
                        format!("Test '{}' references unknown step '{}'", test_name, step),
                    ));
                }
            }
        }
    }

    debug!(violations = out.len(), "check_references: done");
    out
}
