//! Allocation policies
//!
//! The policy is picked once per call from the role name. Each variant fixes
//! a percentage of the context window, an absolute cap, the per-category
//! shares and the content flags.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kinds of supplementary content, in attach order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentCategory {
    Code,
    History,
    FileMetadata,
    RelatedWork,
}

impl ContentCategory {
    pub const ALL: [ContentCategory; 4] = [
        ContentCategory::Code,
        ContentCategory::History,
        ContentCategory::FileMetadata,
        ContentCategory::RelatedWork,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ContentCategory::Code => "code",
            ContentCategory::History => "history",
            ContentCategory::FileMetadata => "file metadata",
            ContentCategory::RelatedWork => "related work",
        }
    }
}

/// Closed set of budget policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationPolicy {
    /// Planner / architect roles: broad context, structure preserved
    Planning,
    /// Debugger-like roles: code-heavy, error windows when whole files don't fit
    ErrorDiagnosis,
    /// Reviewer roles: code plus file metadata
    Review,
    Default,
}

impl AllocationPolicy {
    pub fn for_role(role: &str) -> Self {
        let role = role.to_ascii_lowercase();
        match role.as_str() {
            "planner" | "architect" | "planning" => AllocationPolicy::Planning,
            "debugger" | "diagnostician" | "error-diagnosis" | "fixer" => AllocationPolicy::ErrorDiagnosis,
            "reviewer" | "critic" | "auditor" => AllocationPolicy::Review,
            _ => AllocationPolicy::Default,
        }
    }

    /// Percentage of the context window available for supplementary content
    pub fn window_percent(&self) -> u64 {
        match self {
            AllocationPolicy::Planning => 40,
            AllocationPolicy::ErrorDiagnosis => 60,
            AllocationPolicy::Review => 50,
            AllocationPolicy::Default => 30,
        }
    }

    /// Absolute ceiling regardless of window size
    pub fn absolute_cap(&self) -> u64 {
        match self {
            AllocationPolicy::Planning => 32_000,
            AllocationPolicy::ErrorDiagnosis => 48_000,
            AllocationPolicy::Review => 40_000,
            AllocationPolicy::Default => 16_000,
        }
    }

    /// Share of the total per category, in percent; zero means excluded
    fn share(&self, category: ContentCategory) -> u64 {
        use ContentCategory::*;
        match (self, category) {
            (AllocationPolicy::Planning, Code) => 50,
            (AllocationPolicy::Planning, History) => 20,
            (AllocationPolicy::Planning, FileMetadata) => 15,
            (AllocationPolicy::Planning, RelatedWork) => 15,
            (AllocationPolicy::ErrorDiagnosis, Code) => 70,
            (AllocationPolicy::ErrorDiagnosis, History) => 20,
            (AllocationPolicy::ErrorDiagnosis, FileMetadata) => 10,
            (AllocationPolicy::ErrorDiagnosis, RelatedWork) => 0,
            (AllocationPolicy::Review, Code) => 80,
            (AllocationPolicy::Review, FileMetadata) => 20,
            (AllocationPolicy::Review, _) => 0,
            (AllocationPolicy::Default, Code) => 100,
            (AllocationPolicy::Default, _) => 0,
        }
    }

    fn prioritize_comments(&self) -> bool {
        matches!(self, AllocationPolicy::Planning | AllocationPolicy::Review)
    }

    fn preserve_structure(&self) -> bool {
        matches!(self, AllocationPolicy::Planning | AllocationPolicy::Review)
    }
}

/// Token ceilings for one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    pub policy: AllocationPolicy,
    /// Total tokens for supplementary content
    pub total: u64,
    pub ceilings: BTreeMap<ContentCategory, u64>,
    /// Keep comment lines when reducing code to an outline
    pub prioritize_comments: bool,
    /// Fall back to a structural outline before a bare placeholder
    pub preserve_structure: bool,
}

impl BudgetAllocation {
    /// Ceiling for a category; zero when the category is excluded
    pub fn ceiling(&self, category: ContentCategory) -> u64 {
        self.ceilings.get(&category).copied().unwrap_or(0)
    }

    pub fn includes(&self, category: ContentCategory) -> bool {
        self.ceiling(category) > 0
    }
}

/// Allocate ceilings for a role and context window
///
/// The smaller of the percentage ceiling and the absolute cap wins.
pub fn allocate(role: &str, context_window: u32) -> BudgetAllocation {
    let policy = AllocationPolicy::for_role(role);
    let by_percent = context_window as u64 * policy.window_percent() / 100;
    let total = by_percent.min(policy.absolute_cap());
    debug!(%role, %context_window, ?policy, %total, "allocate: called");

    let ceilings = ContentCategory::ALL
        .iter()
        .filter_map(|&c| {
            let share = policy.share(c);
            (share > 0).then(|| (c, total * share / 100))
        })
        .collect();

    BudgetAllocation {
        policy,
        total,
        ceilings,
        prioritize_comments: policy.prioritize_comments(),
        preserve_structure: policy.preserve_structure(),
    }
}
