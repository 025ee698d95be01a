//! Model registry - role to model mapping
//!
//! The registry is an immutable snapshot built once from a list of entries.
//! Reloading produces a new snapshot; [`RegistryHandle`] swaps snapshots
//! atomically so readers holding the previous one finish with it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

mod entry;
mod error;
mod loader;

pub use entry::{ALLOWED_METHODS, ApiTemplate, RegistryEntry};
pub use error::RegistryError;
pub use loader::parse_entries;

/// Immutable role -> model table
#[derive(Debug, Default)]
pub struct ModelRegistry {
    entries: Vec<Arc<RegistryEntry>>,
    by_role: HashMap<String, usize>,
    source: Option<PathBuf>,
}

impl ModelRegistry {
    /// Build a registry from entries
    ///
    /// Duplicate role definitions resolve last-entry-wins.
    pub fn from_entries(entries: Vec<RegistryEntry>) -> Self {
        debug!(entry_count = entries.len(), "ModelRegistry::from_entries: called");
        let mut by_role = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            for role in &entry.roles {
                if let Some(prev) = by_role.insert(role.clone(), idx) {
                    warn!(
                        %role,
                        previous_model = %entries[prev].model,
                        model = %entry.model,
                        "Duplicate role definition, last entry wins"
                    );
                }
            }
        }

        Self {
            entries: entries.into_iter().map(Arc::new).collect(),
            by_role,
            source: None,
        }
    }

    /// Parse a registry from source text
    pub fn from_source(source: &str) -> Result<Self, RegistryError> {
        debug!("ModelRegistry::from_source: called");
        Ok(Self::from_entries(parse_entries(source)?))
    }

    /// Load a registry from a YAML or JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        debug!(?path, "ModelRegistry::load: called");
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut registry = Self::from_source(&content)?;
        registry.source = Some(path.to_path_buf());
        info!(
            path = %path.display(),
            models = registry.entries.len(),
            roles = registry.by_role.len(),
            "Loaded model registry"
        );
        Ok(registry)
    }

    /// Re-read the source this registry was loaded from
    ///
    /// Returns a fresh snapshot; `self` is left untouched.
    pub fn reload(&self) -> Result<Self, RegistryError> {
        debug!(source = ?self.source, "ModelRegistry::reload: called");
        let path = self.source.as_ref().ok_or(RegistryError::NoSource)?;
        Self::load(path)
    }

    /// Resolve a role to its entry
    pub fn resolve(&self, role: &str) -> Option<Arc<RegistryEntry>> {
        let found = self.by_role.get(role).map(|&idx| self.entries[idx].clone());
        debug!(%role, found = found.is_some(), "ModelRegistry::resolve: called");
        found
    }

    /// All known roles, sorted
    pub fn roles(&self) -> Vec<String> {
        let mut roles: Vec<String> = self.by_role.keys().cloned().collect();
        roles.sort();
        roles
    }

    pub fn entries(&self) -> &[Arc<RegistryEntry>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shared, swappable registry snapshot
#[derive(Debug, Default)]
pub struct RegistryHandle {
    current: RwLock<Arc<ModelRegistry>>,
}

impl RegistryHandle {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// Current snapshot; stays valid across later reloads
    pub fn snapshot(&self) -> Arc<ModelRegistry> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the snapshot wholesale
    pub fn replace(&self, registry: ModelRegistry) {
        debug!(models = registry.len(), "RegistryHandle::replace: called");
        let next = Arc::new(registry);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Reload from the current snapshot's source and swap it in
    pub fn reload(&self) -> Result<Arc<ModelRegistry>, RegistryError> {
        debug!("RegistryHandle::reload: called");
        let fresh = self.snapshot().reload()?;
        self.replace(fresh);
        Ok(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn entry(model: &str, roles: &[&str]) -> RegistryEntry {
        RegistryEntry {
            roles: roles.iter().map(|r| r.to_string()).collect(),
            model: model.to_string(),
            context_window: 8192,
            api: ApiTemplate {
                method: "POST".to_string(),
                url: "https://api.example.com/v1/chat/completions".to_string(),
                auth_header: None,
            },
            parameters: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_resolve_known_and_unknown_roles() {
        let registry = ModelRegistry::from_entries(vec![entry("gpt-4o", &["planner"])]);
        assert_eq!(registry.resolve("planner").unwrap().model, "gpt-4o");
        assert!(registry.resolve("debugger").is_none());
    }

    #[test]
    fn test_duplicate_role_last_entry_wins() {
        let registry = ModelRegistry::from_entries(vec![
            entry("first", &["planner", "reviewer"]),
            entry("second", &["planner"]),
        ]);
        assert_eq!(registry.resolve("planner").unwrap().model, "second");
        assert_eq!(registry.resolve("reviewer").unwrap().model, "first");
        assert_eq!(registry.roles(), vec!["planner", "reviewer"]);
    }

    #[test]
    fn test_reload_without_source_fails() {
        let registry = ModelRegistry::from_entries(vec![]);
        assert!(matches!(registry.reload(), Err(RegistryError::NoSource)));
    }

    #[test]
    fn test_handle_reload_keeps_old_snapshot_alive() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "- model: old\n  role: planner\n  context_window: 100\n  api:\n    endpoint: POST https://a.test/chat"
        )
        .unwrap();

        let handle = RegistryHandle::new(ModelRegistry::load(file.path()).unwrap());
        let before = handle.snapshot();

        std::fs::write(
            file.path(),
            "- model: new\n  role: planner\n  context_window: 100\n  api:\n    endpoint: POST https://a.test/chat\n",
        )
        .unwrap();

        let after = handle.reload().unwrap();
        assert_eq!(before.resolve("planner").unwrap().model, "old");
        assert_eq!(after.resolve("planner").unwrap().model, "new");
        assert_eq!(handle.snapshot().resolve("planner").unwrap().model, "new");
    }

    #[test]
    fn test_failed_reload_leaves_snapshot_in_place() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "- model: keep\n  role: planner\n  context_window: 100\n  api:\n    endpoint: POST https://a.test/chat"
        )
        .unwrap();
        let handle = RegistryHandle::new(ModelRegistry::load(file.path()).unwrap());

        std::fs::write(file.path(), "- model: broken\n").unwrap();
        assert!(handle.reload().is_err());
        assert_eq!(handle.snapshot().resolve("planner").unwrap().model, "keep");
    }
}
