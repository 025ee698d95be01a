//! Planwright - resilient model routing and validated planning documents
//!
//! Routes a planning request to a model chosen by role, then turns the free
//! form reply into a planning document that has passed schema, reference and
//! content checks, automatic repair, and a human-review checkpoint.
//!
//! # Modules
//!
//! - [`registry`] - Role to model table, loaded and reloaded as snapshots
//! - [`llm`] - Model client trait and HTTP implementation
//! - [`router`] - Retries, circuit breaking, fallback and call metrics
//! - [`budget`] - Context budgets per role and supplementary content fitting
//! - [`plan`] - Planning document model, reply parsing, element ids
//! - [`validate`] - Schema, reference and content checks
//! - [`repair`] - Deterministic fixes for violations
//! - [`prompts`] - Handlebars prompt templates
//! - [`workflow`] - Generation / repair / review state machine
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod budget;
pub mod cli;
pub mod config;
pub mod llm;
pub mod plan;
pub mod prompts;
pub mod registry;
pub mod repair;
pub mod router;
pub mod validate;
pub mod workflow;

// Re-export commonly used types
pub use config::Config;
pub use llm::{HttpModelClient, LlmError, ModelClient, ModelReply, ModelRequest};
pub use plan::PlanningDocument;
pub use registry::{ModelRegistry, RegistryEntry, RegistryHandle};
pub use router::{RouteError, RouteOptions, Router};
pub use validate::{Category, Violation};
pub use workflow::{Orchestrator, WorkflowOutcome, WorkflowState, WorkflowStatus};
