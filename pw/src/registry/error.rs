//! Registry error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort registry loading
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read registry {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse registry: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Registry source must be a list of entries")]
    NotAList,

    #[error("Registry entry {index}: field '{field}' {reason}")]
    InvalidEntry { index: usize, field: String, reason: String },

    #[error("Registry has no source path to reload from")]
    NoSource,
}

impl RegistryError {
    pub(crate) fn invalid(index: usize, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEntry {
            index,
            field: field.into(),
            reason: reason.into(),
        }
    }
}
