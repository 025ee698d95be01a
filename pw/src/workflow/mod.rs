//! Planning workflow
//!
//! Drives request → generate → validate → repair → review → final as an
//! explicit state machine, bounded by round and repair limits.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

mod orchestrator;
mod requester;
mod review;

pub use orchestrator::Orchestrator;
pub use requester::{ConsoleRequester, Requester, RequesterError, ScriptedRequester};
pub use review::{FileReviewStore, MemoryReviewStore, ReviewEdit, ReviewError, ReviewStore};

use crate::plan::PlanningDocument;
use crate::validate::Violation;

/// States of the planning workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Generate,
    NeedsClarification,
    Invalid,
    RepairAttempt,
    StillInvalid,
    Valid,
    HumanReviewWrite,
    HumanReviewRead,
    Final,
    ReviewFailed,
    Failed,
    Cancelled,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Final | Self::ReviewFailed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generate => "GENERATE",
            Self::NeedsClarification => "NEEDS_CLARIFICATION",
            Self::Invalid => "INVALID",
            Self::RepairAttempt => "REPAIR_ATTEMPT",
            Self::StillInvalid => "STILL_INVALID",
            Self::Valid => "VALID",
            Self::HumanReviewWrite => "HUMAN_REVIEW_WRITE",
            Self::HumanReviewRead => "HUMAN_REVIEW_READ",
            Self::Final => "FINAL",
            Self::ReviewFailed => "REVIEW_FAILED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Final,
    ReviewFailed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn state(&self) -> WorkflowState {
        match self {
            Self::Final => WorkflowState::Final,
            Self::ReviewFailed => WorkflowState::ReviewFailed,
            Self::Failed => WorkflowState::Failed,
            Self::Cancelled => WorkflowState::Cancelled,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == Self::Final
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.state().fmt(f)
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub run_id: String,
    pub status: WorkflowStatus,
    /// Set only for [`WorkflowStatus::Final`]
    pub document: Option<PlanningDocument>,
    /// Last document seen, valid or not
    pub last_document: Option<Value>,
    /// Violations from the last failing validation
    pub violations: Vec<Violation>,
    /// Every non-empty validation result, oldest first
    pub violation_history: Vec<Vec<Violation>>,
    pub rounds: u32,
    pub repairs: u32,
    pub clarifications: u32,
    pub transitions: Vec<WorkflowState>,
    /// Where the review snapshot was written
    pub checkpoint: Option<String>,
    /// Why the run stopped, when not because of violations
    pub error: Option<String>,
}
