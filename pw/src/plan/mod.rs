//! Planning document model
//!
//! Typed document structs, reply parsing, and the element-id consistency pass.
//! Documents travel through validation and repair as `serde_json::Value` and
//! only become a [`PlanningDocument`] once they are valid.

use serde_json::{Map, Value};

mod consistency;
mod document;
mod parse;

pub use consistency::{ConsistencyReport, ensure_element_ids};
pub use document::{
    CodeElement, Dependencies, DependencyRelation, Feature, FeatureDependency, FeatureGroup, ImplementationStep,
    PlanningDocument, RiskAssessment, SystemDesign, TestCase, TestRequirements,
};
pub use parse::{LEGACY_GROUP_NAME, ParsedReply, clarification_question, empty_document, normalize, parse_reply};
pub(crate) use parse::type_name;

/// Position of a feature: (group index, feature index)
pub type FeatureKey = (usize, usize);

/// Every feature object in document order
pub(crate) fn features(doc: &Value) -> impl Iterator<Item = (FeatureKey, &Map<String, Value>)> {
    doc.get("feature_groups")
        .and_then(Value::as_array)
        .into_iter()
        .flat_map(|groups| groups.iter().enumerate())
        .filter_map(|(g, group)| group.get("features").and_then(Value::as_array).map(|fs| (g, fs)))
        .flat_map(|(g, fs)| {
            fs.iter()
                .enumerate()
                .filter_map(move |(f, feature)| feature.as_object().map(|o| ((g, f), o)))
        })
}

/// Mutable counterpart of [`features`]
pub(crate) fn features_mut(doc: &mut Value) -> impl Iterator<Item = (FeatureKey, &mut Map<String, Value>)> {
    doc.get_mut("feature_groups")
        .and_then(Value::as_array_mut)
        .into_iter()
        .flat_map(|groups| groups.iter_mut().enumerate())
        .filter_map(|(g, group)| group.get_mut("features").and_then(Value::as_array_mut).map(|fs| (g, fs)))
        .flat_map(|(g, fs)| {
            fs.iter_mut()
                .enumerate()
                .filter_map(move |(f, feature)| feature.as_object_mut().map(|o| ((g, f), o)))
        })
}

/// JSON pointer to a feature
pub fn feature_pointer((g, f): FeatureKey) -> String {
    format!("/feature_groups/{}/features/{}", g, f)
}

/// Deserialize a valid document into its typed form
pub fn to_document(doc: &Value) -> Result<PlanningDocument, serde_json::Error> {
    serde_json::from_value(doc.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_features_walks_all_groups() {
        let doc = json!({"feature_groups": [
            {"features": [{"name": "a"}, "junk", {"name": "b"}]},
            {"name": "no features"},
            {"features": [{"name": "c"}]}
        ]});
        let keys: Vec<FeatureKey> = features(&doc).map(|(k, _)| k).collect();
        assert_eq!(keys, vec![(0, 0), (0, 2), (2, 0)]);
    }

    #[test]
    fn test_feature_pointer_resolves() {
        let doc = json!({"feature_groups": [{"features": [{"name": "a"}, {"name": "b"}]}]});
        let ptr = feature_pointer((0, 1));
        assert_eq!(doc.pointer(&ptr).unwrap()["name"], "b");
    }
}
