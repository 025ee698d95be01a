//! Element-id consistency pass
//!
//! Guarantees every code element carries a document-unique `element_id` and
//! that tests naming a `target_element` carry the matching id. Running the
//! pass twice changes nothing the second time.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{features, features_mut};
use crate::plan::TestRequirements;

/// What the pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// Elements that had no id
    pub assigned: usize,
    /// Elements whose id duplicated an earlier one
    pub renamed: usize,
    /// Tests whose `target_element_id` was set or corrected
    pub linked: usize,
}

impl ConsistencyReport {
    pub fn changed(&self) -> bool {
        self.assigned + self.renamed + self.linked > 0
    }
}

fn element_id_of(element: &Value) -> Option<&str> {
    element
        .get("element_id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

fn unique_id(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Assign, de-duplicate and link element ids in place
pub fn ensure_element_ids(doc: &mut Value) -> ConsistencyReport {
    debug!("ensure_element_ids: called");
    let mut report = ConsistencyReport::default();

    // Every id already present anywhere; generated ids must avoid all of them
    let mut taken: HashSet<String> = features(doc)
        .flat_map(|(_, feature)| code_elements(feature))
        .filter_map(|e| element_id_of(e).map(str::to_string))
        .collect();
    let mut seen: HashSet<String> = HashSet::new();

    for ((g, f), feature) in features_mut(doc) {
        let Some(elements) = feature
            .get_mut("system_design")
            .and_then(|d| d.get_mut("code_elements"))
            .and_then(Value::as_array_mut)
        else {
            continue;
        };

        for (n, element) in elements.iter_mut().enumerate() {
            if !element.is_object() {
                continue;
            }
            let current = element_id_of(element).map(str::to_string);
            let Some(obj) = element.as_object_mut() else {
                continue;
            };

            let id = match current {
                Some(id) if seen.insert(id.clone()) => continue,
                Some(id) => {
                    report.renamed += 1;
                    unique_id(&id, &taken)
                }
                None => {
                    report.assigned += 1;
                    unique_id(&format!("E-{}-{}-{}", g + 1, f + 1, n + 1), &taken)
                }
            };
            debug!(%id, group = g, feature = f, "ensure_element_ids: new id");
            taken.insert(id.clone());
            seen.insert(id.clone());
            obj.insert("element_id".to_string(), Value::String(id));
        }
    }

    // Name -> id, first occurrence wins; same-feature elements are preferred
    let mut global: HashMap<String, String> = HashMap::new();
    let mut local: HashMap<(usize, usize), HashMap<String, String>> = HashMap::new();
    for (key, feature) in features(doc) {
        for element in code_elements(feature) {
            let (Some(name), Some(id)) = (element.get("name").and_then(Value::as_str), element_id_of(element)) else {
                continue;
            };
            global.entry(name.to_string()).or_insert_with(|| id.to_string());
            local
                .entry(key)
                .or_default()
                .entry(name.to_string())
                .or_insert_with(|| id.to_string());
        }
    }

    for (key, feature) in features_mut(doc) {
        let Some(tests) = feature.get_mut("test_requirements").and_then(Value::as_object_mut) else {
            continue;
        };
        for kind in TestRequirements::KINDS {
            let Some(list) = tests.get_mut(kind).and_then(Value::as_array_mut) else {
                continue;
            };
            for test in list.iter_mut().filter_map(Value::as_object_mut) {
                let Some(target) = test.get("target_element").and_then(Value::as_str) else {
                    continue;
                };
                let resolved = local
                    .get(&key)
                    .and_then(|m| m.get(target))
                    .or_else(|| global.get(target));
                let Some(id) = resolved else {
                    continue;
                };
                if test.get("target_element_id").and_then(Value::as_str) != Some(id.as_str()) {
                    test.insert("target_element_id".to_string(), Value::String(id.clone()));
                    report.linked += 1;
                }
            }
        }
    }

    debug!(?report, "ensure_element_ids: done");
    report
}

fn code_elements(feature: &serde_json::Map<String, Value>) -> impl Iterator<Item = &Value> {
    feature
        .get("system_design")
        .and_then(|d| d.get("code_elements"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}
