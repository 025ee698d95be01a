//! Planning document types
//!
//! The canonical shape is a list of feature groups. Validation and repair work
//! on the raw JSON value; these types are what a document deserializes into
//! once it has passed validation.

use serde::{Deserialize, Serialize};

/// Top-level planning document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningDocument {
    /// Original request text, clarification answers included
    pub request: String,
    pub feature_groups: Vec<FeatureGroup>,
}

impl PlanningDocument {
    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.feature_groups.iter().flat_map(|g| g.features.iter())
    }

    pub fn feature_count(&self) -> usize {
        self.feature_groups.iter().map(|g| g.features.len()).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub description: String,
    /// 0 (trivial) to 3 (complex)
    pub complexity_level: u8,
    #[serde(default)]
    pub files_affected: Vec<String>,
    pub implementation_steps: Vec<ImplementationStep>,
    #[serde(default)]
    pub test_requirements: TestRequirements,
    #[serde(default)]
    pub dependencies: Dependencies,
    #[serde(default)]
    pub risk_assessment: RiskAssessment,
    #[serde(default)]
    pub system_design: SystemDesign,
}

impl Feature {
    pub fn test_count(&self) -> usize {
        self.test_requirements.all().count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImplementationStep {
    pub step_id: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestRequirements {
    #[serde(default)]
    pub unit_tests: Vec<TestCase>,
    #[serde(default)]
    pub integration_tests: Vec<TestCase>,
    #[serde(default)]
    pub property_tests: Vec<TestCase>,
    #[serde(default)]
    pub acceptance_tests: Vec<TestCase>,
}

impl TestRequirements {
    /// JSON keys of the four test lists
    pub const KINDS: [&'static str; 4] = ["unit_tests", "integration_tests", "property_tests", "acceptance_tests"];

    pub fn all(&self) -> impl Iterator<Item = &TestCase> {
        self.unit_tests
            .iter()
            .chain(&self.integration_tests)
            .chain(&self.property_tests)
            .chain(&self.acceptance_tests)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Code element this test exercises, by name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_element: Option<String>,
    /// Filled by the consistency pass from `target_element`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_element_id: Option<String>,
    /// Implementation step this test verifies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_ref: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dependencies {
    #[serde(default)]
    pub internal: Vec<String>,
    #[serde(default)]
    pub external: Vec<String>,
    #[serde(default)]
    pub features: Vec<FeatureDependency>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureDependency {
    /// Name of another feature in the same document
    pub feature: String,
    #[serde(default)]
    pub relation: DependencyRelation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyRelation {
    #[default]
    Requires,
    Extends,
    Blocks,
    RelatesTo,
}

impl DependencyRelation {
    /// Wire names accepted in `relation`
    pub const NAMES: [&'static str; 4] = ["requires", "extends", "blocks", "relates_to"];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    #[serde(default)]
    pub critical_files: Vec<String>,
    #[serde(default)]
    pub potential_regressions: Vec<String>,
    #[serde(default)]
    pub mitigations: Vec<String>,
    #[serde(default)]
    pub security_concerns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemDesign {
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub code_elements: Vec<CodeElement>,
    #[serde(default)]
    pub data_flow: Vec<String>,
    #[serde(default)]
    pub key_algorithms: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeElement {
    #[serde(default)]
    pub element_id: String,
    pub name: String,
    #[serde(default)]
    pub element_type: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub purpose: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_minimal_feature() {
        let value = json!({
            "request": "Add caching",
            "feature_groups": [{
                "name": "Cache",
                "features": [{
                    "name": "LRU store",
                    "description": "In-memory LRU",
                    "complexity_level": 1,
                    "implementation_steps": [{"step_id": "S1", "description": "Write store"}],
                    "test_requirements": {"unit_tests": [{"name": "evicts oldest"}]},
                    "dependencies": {"features": [{"feature": "Config", "relation": "extends"}]}
                }]
            }]
        });

        let doc: PlanningDocument = serde_json::from_value(value).unwrap();
        assert_eq!(doc.feature_count(), 1);
        let feature = doc.features().next().unwrap();
        assert_eq!(feature.test_count(), 1);
        assert_eq!(feature.dependencies.features[0].relation, DependencyRelation::Extends);
        assert!(feature.system_design.code_elements.is_empty());
    }

    #[test]
    fn test_relation_names_deserialize() {
        for name in DependencyRelation::NAMES {
            let relation: DependencyRelation = serde_json::from_value(json!(name)).unwrap();
            assert_eq!(serde_json::to_value(relation).unwrap(), json!(name));
        }
        assert!(serde_json::from_value::<DependencyRelation>(json!("depends_on")).is_err());
    }

    #[test]
    fn test_serialize_skips_empty_test_links() {
        let test = TestCase {
            name: "t".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&test).unwrap();
        assert!(value.get("target_element_id").is_none());
    }
}
