//! Router error types

use thiserror::Error;

use crate::llm::LlmError;

/// Why a route produced no reply
#[derive(Debug, Clone, Error)]
pub enum RouteError {
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Circuit open for model {model}")]
    CircuitOpen { model: String },

    #[error("Role {role} failed after {attempts} attempts: {last}")]
    Exhausted { role: String, attempts: u32, last: LlmError },
}

impl RouteError {
    /// Configuration problem rather than a transport one
    pub fn is_configuration(&self) -> bool {
        matches!(self, RouteError::UnknownRole(_))
    }
}
