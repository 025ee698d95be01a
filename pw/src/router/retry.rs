//! Retry policy and attempt transitions
//!
//! The router's loop is driven by [`advance`], a pure function from the
//! current retry state and one attempt outcome to the next step. No sleeping
//! or I/O happens here.

use std::time::Duration;

use tracing::debug;

use crate::config::RouterConfig;
use crate::llm::{LlmError, ModelReply};

/// Backoff and attempt limits
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts against the primary model (at least one)
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RouterConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier,
            min_backoff: Duration::from_millis(config.min_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    fn clamp(&self, backoff: Duration) -> Duration {
        backoff.max(self.min_backoff).min(self.max_backoff.max(self.min_backoff))
    }

    pub fn first_backoff(&self) -> Duration {
        self.clamp(self.initial_backoff)
    }

    pub fn next_backoff(&self, current: Duration) -> Duration {
        let scaled = current.as_secs_f64() * self.multiplier.max(1.0);
        let scaled = Duration::try_from_secs_f64(scaled).unwrap_or(self.max_backoff);
        self.clamp(scaled)
    }
}

/// What happened on one attempt
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// Circuit open; no network call was made
    Skipped,
    Succeeded(ModelReply),
    Failed(LlmError),
}

/// What the router does next
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Return(ModelReply),
    RetryAfter(Duration),
    /// Primary path is done; go to fallback or give up
    Exhausted,
}

/// Progress through the primary retry budget
#[derive(Debug, Clone)]
pub struct RetryState {
    /// Attempts that reached the network
    pub attempts: u32,
    pub backoff: Duration,
    pub skipped: bool,
    pub last_error: Option<LlmError>,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempts: 0,
            backoff: policy.first_backoff(),
            skipped: false,
            last_error: None,
        }
    }
}

/// Transition on one attempt outcome
pub fn advance(policy: &RetryPolicy, state: RetryState, outcome: AttemptOutcome) -> (RetryState, Step) {
    match outcome {
        AttemptOutcome::Succeeded(reply) => {
            debug!(attempts = state.attempts + 1, "advance: success");
            let next = RetryState {
                attempts: state.attempts + 1,
                last_error: None,
                ..state
            };
            (next, Step::Return(reply))
        }
        AttemptOutcome::Skipped => {
            debug!("advance: circuit open, skipping primary");
            (RetryState { skipped: true, ..state }, Step::Exhausted)
        }
        AttemptOutcome::Failed(err) => {
            let attempts = state.attempts + 1;
            let retryable = err.is_retryable();
            let step = if retryable && attempts < policy.attempts() {
                Step::RetryAfter(state.backoff)
            } else {
                Step::Exhausted
            };
            let backoff = match step {
                Step::RetryAfter(current) => policy.next_backoff(current),
                _ => state.backoff,
            };
            debug!(%attempts, %retryable, ?step, "advance: failure");
            let next = RetryState {
                attempts,
                backoff,
                skipped: state.skipped,
                last_error: Some(err),
            };
            (next, step)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(100),
            multiplier: 2.0,
            min_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(350),
        }
    }

    fn transient() -> AttemptOutcome {
        AttemptOutcome::Failed(LlmError::Connection("reset".into()))
    }

    #[test]
    fn test_success_returns_reply() {
        let p = policy(3);
        let (state, step) = advance(&p, RetryState::new(&p), AttemptOutcome::Succeeded(ModelReply::text("ok")));
        assert_eq!(step, Step::Return(ModelReply::text("ok")));
        assert_eq!(state.attempts, 1);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let p = policy(5);
        let mut state = RetryState::new(&p);
        let mut sleeps = Vec::new();
        loop {
            let (next, step) = advance(&p, state, transient());
            state = next;
            match step {
                Step::RetryAfter(d) => sleeps.push(d.as_millis()),
                Step::Exhausted => break,
                Step::Return(_) => unreachable!(),
            }
        }
        assert_eq!(sleeps, vec![100, 200, 350, 350]);
        assert_eq!(state.attempts, 5);
        assert!(state.last_error.is_some());
    }

    #[test]
    fn test_backoff_floor() {
        let mut p = policy(3);
        p.initial_backoff = Duration::from_millis(1);
        assert_eq!(p.first_backoff(), Duration::from_millis(50));
    }

    #[test]
    fn test_non_retryable_exhausts_immediately() {
        let p = policy(3);
        let (state, step) = advance(
            &p,
            RetryState::new(&p),
            AttemptOutcome::Failed(LlmError::MissingCredential("KEY".into())),
        );
        assert_eq!(step, Step::Exhausted);
        assert_eq!(state.attempts, 1);
    }

    #[test]
    fn test_skip_makes_no_attempt() {
        let p = policy(3);
        let (state, step) = advance(&p, RetryState::new(&p), AttemptOutcome::Skipped);
        assert_eq!(step, Step::Exhausted);
        assert_eq!(state.attempts, 0);
        assert!(state.skipped);
    }

    #[test]
    fn test_zero_retries_still_attempts_once() {
        let p = policy(0);
        assert_eq!(p.attempts(), 1);
        let (_, step) = advance(&p, RetryState::new(&p), transient());
        assert_eq!(step, Step::Exhausted);
    }
}
