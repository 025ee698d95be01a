//! Call records and aggregate router metrics
//!
//! Tracks:
//! - One append-only record per model call attempt
//! - Success/failure counts per model and per role
//! - Call durations and outgoing token estimates

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One model call attempt; never mutated after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub role: String,
    pub model: String,
    /// 1-based attempt index within a route call
    pub attempt: u32,
    pub duration_ms: u64,
    pub success: bool,
    /// Estimated tokens of the outgoing request
    pub token_estimate: u64,
    pub recorded_at: DateTime<Utc>,
}

impl CallRecord {
    pub fn new(
        role: impl Into<String>,
        model: impl Into<String>,
        attempt: u32,
        duration: Duration,
        success: bool,
        token_estimate: u64,
    ) -> Self {
        Self {
            role: role.into(),
            model: model.into(),
            attempt,
            duration_ms: duration.as_millis() as u64,
            success,
            token_estimate,
            recorded_at: Utc::now(),
        }
    }
}

/// Aggregates for one model or role
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallStats {
    pub calls: u64,
    pub failures: u64,
    pub total_duration_ms: u64,
    pub total_tokens: u64,
}

impl CallStats {
    fn add(&mut self, record: &CallRecord) {
        self.calls += 1;
        if !record.success {
            self.failures += 1;
        }
        self.total_duration_ms += record.duration_ms;
        self.total_tokens += record.token_estimate;
    }

    pub fn success_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            (self.calls - self.failures) as f64 / self.calls as f64
        }
    }

    pub fn avg_duration_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.calls as f64
        }
    }
}

/// Snapshot for display
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_calls: u64,
    pub total_failures: u64,
    pub by_model: BTreeMap<String, CallStats>,
    pub by_role: BTreeMap<String, CallStats>,
}

/// Thread-safe call log
#[derive(Debug, Default)]
pub struct CallMetrics {
    records: RwLock<Vec<CallRecord>>,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
}

impl CallMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record
    pub fn record(&self, record: CallRecord) {
        debug!(role = %record.role, model = %record.model, success = record.success, "CallMetrics::record: called");
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        if !record.success {
            self.total_failures.fetch_add(1, Ordering::Relaxed);
        }
        match self.records.write() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }

    /// Copy of every record so far, in insertion order
    pub fn records(&self) -> Vec<CallRecord> {
        match self.records.read() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> MetricsSummary {
        debug!("CallMetrics::summary: called");
        let mut summary = MetricsSummary {
            total_calls: self.total_calls(),
            total_failures: self.total_failures(),
            ..Default::default()
        };
        for record in self.records() {
            summary.by_model.entry(record.model.clone()).or_default().add(&record);
            summary.by_role.entry(record.role.clone()).or_default().add(&record);
        }
        summary
    }
}
