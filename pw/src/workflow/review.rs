//! Human-review checkpoint
//!
//! A valid document is written to a staging location, the workflow waits for
//! review, then reads the snapshot back. Whatever comes back is what gets
//! validated, so a reviewer's edits are honoured.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Review I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Review snapshot is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No review snapshot for run {0}")]
    NotFound(String),

    #[error("Review wait cancelled")]
    Cancelled,

    #[error("Review not completed within {0:?}")]
    TimedOut(Duration),
}

impl ReviewError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::NotFound(path.display().to_string());
        }
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Staging interface for the review checkpoint
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Persist the snapshot; returns where it was written
    async fn write_snapshot(&self, run_id: &str, document: &Value) -> Result<String, ReviewError>;

    /// Suspend until the snapshot has been reviewed
    async fn wait_for_review(&self, _run_id: &str) -> Result<(), ReviewError> {
        Ok(())
    }

    async fn read_snapshot(&self, run_id: &str) -> Result<Value, ReviewError>;
}

/// One pretty-printed JSON file per run
///
/// With approval required, the wait polls for a sibling `<run>.approved`
/// marker file.
#[derive(Debug, Clone)]
pub struct FileReviewStore {
    dir: PathBuf,
    require_approval: bool,
    poll_interval: Duration,
}

impl FileReviewStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            require_approval: false,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_approval(mut self, required: bool) -> Self {
        self.require_approval = required;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn snapshot_path(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", run_id))
    }

    pub fn approval_path(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("{}.approved", run_id))
    }
}

#[async_trait]
impl ReviewStore for FileReviewStore {
    async fn write_snapshot(&self, run_id: &str, document: &Value) -> Result<String, ReviewError> {
        debug!(%run_id, dir = ?self.dir, "FileReviewStore::write_snapshot: called");
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ReviewError::io(&self.dir, e))?;

        let path = self.snapshot_path(run_id);
        let body = serde_json::to_string_pretty(document)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| ReviewError::io(&path, e))?;

        info!("Wrote review snapshot to {}", path.display());
        Ok(path.display().to_string())
    }

    async fn wait_for_review(&self, run_id: &str) -> Result<(), ReviewError> {
        if !self.require_approval {
            return Ok(());
        }
        let marker = self.approval_path(run_id);
        info!("Waiting for review approval marker {}", marker.display());
        while !tokio::fs::try_exists(&marker)
            .await
            .map_err(|e| ReviewError::io(&marker, e))?
        {
            tokio::time::sleep(self.poll_interval).await;
        }
        debug!(%run_id, "FileReviewStore::wait_for_review: approved");
        Ok(())
    }

    async fn read_snapshot(&self, run_id: &str) -> Result<Value, ReviewError> {
        debug!(%run_id, "FileReviewStore::read_snapshot: called");
        let path = self.snapshot_path(run_id);
        let body = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ReviewError::io(&path, e))?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Edit applied by a simulated reviewer
pub type ReviewEdit = Box<dyn Fn(&mut Value) + Send + Sync>;

/// In-memory store; snapshots are kept serialized
#[derive(Default)]
pub struct MemoryReviewStore {
    snapshots: Mutex<HashMap<String, String>>,
    edit: Option<ReviewEdit>,
    held: bool,
}

impl MemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `edit` to the snapshot while it is under review
    pub fn with_edit(mut self, edit: impl Fn(&mut Value) + Send + Sync + 'static) -> Self {
        self.edit = Some(Box::new(edit));
        self
    }

    /// Never finish reviewing
    pub fn held(mut self) -> Self {
        self.held = true;
        self
    }

    pub fn snapshot(&self, run_id: &str) -> Option<Value> {
        let guard = self.snapshots.lock().ok()?;
        serde_json::from_str(guard.get(run_id)?).ok()
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().map(|s| s.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn store(&self, run_id: &str, body: String) {
        match self.snapshots.lock() {
            Ok(mut s) => s.insert(run_id.to_string(), body),
            Err(poisoned) => poisoned.into_inner().insert(run_id.to_string(), body),
        };
    }

    fn load(&self, run_id: &str) -> Result<String, ReviewError> {
        let guard = match self.snapshots.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .get(run_id)
            .cloned()
            .ok_or_else(|| ReviewError::NotFound(run_id.to_string()))
    }
}

#[async_trait]
impl ReviewStore for MemoryReviewStore {
    async fn write_snapshot(&self, run_id: &str, document: &Value) -> Result<String, ReviewError> {
        debug!(%run_id, "MemoryReviewStore::write_snapshot: called");
        self.store(run_id, serde_json::to_string(document)?);
        Ok(format!("memory://{}", run_id))
    }

    async fn wait_for_review(&self, run_id: &str) -> Result<(), ReviewError> {
        if self.held {
            std::future::pending::<()>().await;
        }
        if let Some(edit) = &self.edit {
            let mut doc: Value = serde_json::from_str(&self.load(run_id)?)?;
            edit(&mut doc);
            self.store(run_id, serde_json::to_string(&doc)?);
        }
        Ok(())
    }

    async fn read_snapshot(&self, run_id: &str) -> Result<Value, ReviewError> {
        Ok(serde_json::from_str(&self.load(run_id)?)?)
    }
}
