//! Per-model circuit breaker
//!
//! Each model name owns its own lock. The outer map lock is only held long
//! enough to find or insert a slot, so unrelated models never serialize on
//! each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Failure bookkeeping for one model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CircuitState {
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// When the most recent failure happened
    pub last_failure: Option<Instant>,
}

impl CircuitState {
    /// Open when the threshold is reached and the cooldown has not elapsed
    pub fn is_open(&self, threshold: u32, cooldown: Duration, now: Instant) -> bool {
        match self.last_failure {
            Some(at) if self.consecutive_failures >= threshold => now.saturating_duration_since(at) < cooldown,
            _ => false,
        }
    }
}

type Slot = Arc<Mutex<CircuitState>>;

/// Lazily evaluated circuit breaker keyed by model name
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    slots: RwLock<HashMap<String, Slot>>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        debug!(%threshold, ?cooldown, "CircuitBreaker::new: called");
        Self {
            threshold: threshold.max(1),
            cooldown,
            slots: RwLock::new(HashMap::new()),
        }
    }

    fn slot(&self, model: &str) -> Slot {
        {
            let slots = match self.slots.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(slot) = slots.get(model) {
                return slot.clone();
            }
        }

        let mut slots = match self.slots.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.entry(model.to_string()).or_default().clone()
    }

    fn with_state<R>(&self, model: &str, f: impl FnOnce(&mut CircuitState) -> R) -> R {
        let slot = self.slot(model);
        let mut state = match slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state)
    }

    /// Whether calls to `model` should be skipped right now
    pub fn is_open(&self, model: &str) -> bool {
        self.is_open_at(model, Instant::now())
    }

    pub fn is_open_at(&self, model: &str, now: Instant) -> bool {
        let open = self.with_state(model, |s| s.is_open(self.threshold, self.cooldown, now));
        debug!(%model, %open, "CircuitBreaker::is_open_at: called");
        open
    }

    pub fn record_success(&self, model: &str) {
        debug!(%model, "CircuitBreaker::record_success: called");
        self.with_state(model, |s| {
            s.consecutive_failures = 0;
        });
    }

    /// Count a failure; returns the new consecutive failure count
    pub fn record_failure(&self, model: &str) -> u32 {
        let count = self.with_state(model, |s| {
            s.consecutive_failures += 1;
            s.last_failure = Some(Instant::now());
            s.consecutive_failures
        });
        debug!(%model, %count, "CircuitBreaker::record_failure: called");
        count
    }

    /// Snapshot of one model's state
    pub fn state(&self, model: &str) -> CircuitState {
        self.with_state(model, |s| *s)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_until_threshold() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        breaker.record_failure("m");
        breaker.record_failure("m");
        assert!(!breaker.is_open("m"));
        assert_eq!(breaker.record_failure("m"), 3);
        assert!(breaker.is_open("m"));
    }

    #[test]
    fn test_reopens_after_cooldown() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        breaker.record_failure("m");
        let now = Instant::now();
        assert!(breaker.is_open_at("m", now));
        assert!(!breaker.is_open_at("m", now + Duration::from_secs(31)));
    }

    #[test]
    fn test_success_resets_count() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        breaker.record_failure("m");
        breaker.record_failure("m");
        assert!(breaker.is_open("m"));

        breaker.record_success("m");
        assert_eq!(breaker.state("m").consecutive_failures, 0);
        assert!(!breaker.is_open("m"));
    }

    #[test]
    fn test_models_are_independent() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        breaker.record_failure("a");
        assert!(breaker.is_open("a"));
        assert!(!breaker.is_open("b"));
        assert_eq!(breaker.state("b"), CircuitState::default());
    }

    #[test]
    fn test_concurrent_failures_are_all_counted() {
        let breaker = Arc::new(CircuitBreaker::new(1000, Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let breaker = breaker.clone();
                std::thread::spawn(move || {
                    let model = if i % 2 == 0 { "even" } else { "odd" };
                    for _ in 0..50 {
                        breaker.record_failure(model);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(breaker.state("even").consecutive_failures, 200);
        assert_eq!(breaker.state("odd").consecutive_failures, 200);
    }
}
