//! Typed violations
//!
//! Every check produces [`Violation`]s tagged with a [`ViolationKind`]. The
//! repair engine dispatches on the kind, so each variant carries the JSON
//! pointer it refers to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Broad violation category, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    SchemaStructure,
    ReferenceIntegrity,
    ContentSafety,
    CoverageGap,
    TechnicalFeasibility,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::SchemaStructure,
        Category::ReferenceIntegrity,
        Category::ContentSafety,
        Category::CoverageGap,
        Category::TechnicalFeasibility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::SchemaStructure => "schema-structure",
            Category::ReferenceIntegrity => "reference-integrity",
            Category::ContentSafety => "content-safety",
            Category::CoverageGap => "coverage-gap",
            Category::TechnicalFeasibility => "technical-feasibility",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON type a field is expected to hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Array,
    Object,
}

impl FieldType {
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Array => "array",
            FieldType::Object => "object",
        };
        f.write_str(name)
    }
}

/// What exactly is wrong, and where
///
/// `path` is a JSON pointer. For field-level kinds it points at the object
/// holding `field`; for text kinds it points at the string itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    Unparseable { reason: String },
    NotAnObject { path: String },
    MissingField { path: String, field: String, expected: FieldType },
    WrongType { path: String, field: String, expected: FieldType },
    EmptySequence { path: String, field: String },
    BlankText { path: String, field: String },
    OutOfRange { path: String, field: String, min: i64, max: i64 },
    /// An item of the list at `path/field` has the wrong type
    WrongItemType { path: String, field: String, index: usize, expected: FieldType },
    /// A string field holds a value outside its fixed set
    InvalidChoice { path: String, field: String, value: String },

    DanglingDependency { path: String, target: String },
    /// `field` is `target_element` or `target_element_id`
    DanglingTestTarget { path: String, field: String, target: String },
    /// Name and id both resolve, but to different elements
    MismatchedTestTarget { path: String, target: String, id: String },
    DanglingStepRef { path: String, step: String },
    DuplicateElementId { id: String },

    UnsafeContent { path: String, pattern: String },

    MissingTests { path: String },
    MissingSecurityTest { path: String },
    MissingSecurityConcerns { path: String },

    UnderSpecified { path: String, complexity: i64, steps: usize, min: usize },
    OverSpecified { path: String, complexity: i64, steps: usize, max: usize },
}

impl ViolationKind {
    pub fn category(&self) -> Category {
        use ViolationKind::*;
        match self {
            Unparseable { .. }
            | NotAnObject { .. }
            | MissingField { .. }
            | WrongType { .. }
            | EmptySequence { .. }
            | BlankText { .. }
            | OutOfRange { .. }
            | WrongItemType { .. }
            | InvalidChoice { .. } => Category::SchemaStructure,
            DanglingDependency { .. }
            | DanglingTestTarget { .. }
            | MismatchedTestTarget { .. }
            | DanglingStepRef { .. }
            | DuplicateElementId { .. } => Category::ReferenceIntegrity,
            UnsafeContent { .. } => Category::ContentSafety,
            MissingTests { .. } | MissingSecurityTest { .. } | MissingSecurityConcerns { .. } => Category::CoverageGap,
            UnderSpecified { .. } | OverSpecified { .. } => Category::TechnicalFeasibility,
        }
    }
}

/// Group and optional feature index a violation refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub group: usize,
    pub feature: Option<usize>,
}

impl Locator {
    /// Derive a locator from a JSON pointer under `/feature_groups`
    pub fn from_pointer(path: &str) -> Option<Self> {
        let mut parts = path.split('/').skip(1);
        if parts.next()? != "feature_groups" {
            return None;
        }
        let group = parts.next()?.parse().ok()?;
        let feature = match (parts.next(), parts.next()) {
            (Some("features"), Some(idx)) => idx.parse().ok(),
            _ => None,
        };
        Some(Self { group, feature })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.feature {
            Some(feature) => write!(f, "group {}, feature {}", self.group, feature),
            None => write!(f, "group {}", self.group),
        }
    }
}

/// A single problem found in a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub message: String,
    pub locator: Option<Locator>,
}

impl Violation {
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        let locator = match &kind {
            ViolationKind::Unparseable { .. } | ViolationKind::DuplicateElementId { .. } => None,
            ViolationKind::NotAnObject { path }
            | ViolationKind::MissingField { path, .. }
            | ViolationKind::WrongType { path, .. }
            | ViolationKind::EmptySequence { path, .. }
            | ViolationKind::BlankText { path, .. }
            | ViolationKind::OutOfRange { path, .. }
            | ViolationKind::WrongItemType { path, .. }
            | ViolationKind::InvalidChoice { path, .. }
            | ViolationKind::DanglingDependency { path, .. }
            | ViolationKind::DanglingTestTarget { path, .. }
            | ViolationKind::MismatchedTestTarget { path, .. }
            | ViolationKind::DanglingStepRef { path, .. }
            | ViolationKind::UnsafeContent { path, .. }
            | ViolationKind::MissingTests { path }
            | ViolationKind::MissingSecurityTest { path }
            | ViolationKind::MissingSecurityConcerns { path }
            | ViolationKind::UnderSpecified { path, .. }
            | ViolationKind::OverSpecified { path, .. } => Locator::from_pointer(path),
        };
        Self {
            kind,
            message: message.into(),
            locator,
        }
    }

    pub fn category(&self) -> Category {
        self.kind.category()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.locator {
            Some(loc) => write!(f, "[{}] {} ({})", self.category(), self.message, loc),
            None => write!(f, "[{}] {}", self.category(), self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_from_pointer() {
        assert_eq!(
            Locator::from_pointer("/feature_groups/2/features/5/system_design"),
            Some(Locator {
                group: 2,
                feature: Some(5)
            })
        );
        assert_eq!(
            Locator::from_pointer("/feature_groups/1"),
            Some(Locator { group: 1, feature: None })
        );
        assert_eq!(Locator::from_pointer(""), None);
        assert_eq!(Locator::from_pointer("/request"), None);
    }

    #[test]
    fn test_violation_display() {
        let v = Violation::new(
            ViolationKind::MissingTests {
                path: "/feature_groups/0/features/1".into(),
            },
            "Feature 'x' has no tests",
        );
        assert_eq!(v.category(), Category::CoverageGap);
        assert_eq!(v.to_string(), "[coverage-gap] Feature 'x' has no tests (group 0, feature 1)");
    }

    #[test]
    fn test_field_type_matching() {
        use serde_json::json;
        assert!(FieldType::Integer.matches(&json!(3)));
        assert!(!FieldType::Integer.matches(&json!(3.5)));
        assert!(FieldType::Array.matches(&json!([])));
        assert!(!FieldType::Object.matches(&json!([])));
    }

    #[test]
    fn test_violations_dedupe_in_hash_set() {
        use std::collections::HashSet;
        let missing = || {
            Violation::new(
                ViolationKind::MissingField {
                    path: "/feature_groups/0".into(),
                    field: "name".into(),
                    expected: FieldType::String,
                },
                "Missing required field 'name'",
            )
        };
        let set: HashSet<Violation> = [missing(), missing()].into_iter().collect();
        assert_eq!(set.len(), 1);
    }
}
