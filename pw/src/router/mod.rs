//! Resilience router
//!
//! Resolves a role to a model through the injected registry, then drives the
//! retry loop in [`retry`] against that model: circuit check, timed call,
//! backoff, and at most one attempt against a fallback role.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

mod circuit;
mod error;
mod metrics;
mod retry;

pub use circuit::{CircuitBreaker, CircuitState};
pub use error::RouteError;
pub use metrics::{CallMetrics, CallRecord, CallStats, MetricsSummary};
pub use retry::{AttemptOutcome, RetryPolicy, RetryState, Step, advance};

use crate::config::RouterConfig;
use crate::llm::{LlmError, ModelClient, ModelReply, ModelRequest};
use crate::registry::{RegistryEntry, RegistryHandle};

/// Per-call options
#[derive(Debug, Clone)]
pub struct RouteOptions {
    /// Applies to each network call, not to backoff sleeps
    pub timeout: Duration,
    pub fallback_role: Option<String>,
    /// Overrides merged over the entry's default parameters
    pub parameters: Map<String, Value>,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self::from_config(&RouterConfig::default())
    }
}

impl RouteOptions {
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            timeout: config.timeout(),
            fallback_role: config.fallback_role.clone(),
            parameters: Map::new(),
        }
    }

    pub fn with_fallback(mut self, role: impl Into<String>) -> Self {
        self.fallback_role = Some(role.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A reply plus how it was obtained
#[derive(Debug, Clone)]
pub struct RoutedReply {
    pub reply: ModelReply,
    /// Role that actually answered
    pub role: String,
    pub model: String,
    pub used_fallback: bool,
    /// Network attempts made, fallback included
    pub attempts: u32,
}

/// One entry for [`Router::route_all`]
#[derive(Debug, Clone)]
pub struct RouteCall {
    pub role: String,
    pub system: String,
    pub user: String,
}

/// Role-based router with retries, circuit breaking and fallback
pub struct Router {
    registry: Arc<RegistryHandle>,
    client: Arc<dyn ModelClient>,
    circuit: CircuitBreaker,
    metrics: CallMetrics,
    policy: RetryPolicy,
}

impl Router {
    pub fn new(registry: Arc<RegistryHandle>, client: Arc<dyn ModelClient>, config: &RouterConfig) -> Self {
        debug!(?config, "Router::new: called");
        Self {
            registry,
            client,
            circuit: CircuitBreaker::new(config.failure_threshold, config.cooldown()),
            metrics: CallMetrics::new(),
            policy: RetryPolicy::from_config(config),
        }
    }

    /// Replace the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &Arc<RegistryHandle> {
        &self.registry
    }

    pub fn metrics(&self) -> &CallMetrics {
        &self.metrics
    }

    pub fn circuit(&self) -> &CircuitBreaker {
        &self.circuit
    }

    /// Route a call; `None` when no reply could be obtained
    pub async fn route(&self, role: &str, system: &str, user: &str, options: &RouteOptions) -> Option<ModelReply> {
        match self.route_detailed(role, system, user, options).await {
            Ok(routed) => Some(routed.reply),
            Err(e) => {
                warn!(%role, error = %e, "Route produced no reply");
                None
            }
        }
    }

    /// Route a call and report why it failed
    pub async fn route_detailed(
        &self,
        role: &str,
        system: &str,
        user: &str,
        options: &RouteOptions,
    ) -> Result<RoutedReply, RouteError> {
        debug!(%role, system_len = system.len(), user_len = user.len(), "route_detailed: called");
        let snapshot = self.registry.snapshot();
        let entry = snapshot
            .resolve(role)
            .ok_or_else(|| RouteError::UnknownRole(role.to_string()))?;

        let mut request = ModelRequest::new(system, user);
        request.parameters = options.parameters.clone();

        let mut state = RetryState::new(&self.policy);
        loop {
            let outcome = if self.circuit.is_open(&entry.model) {
                warn!(%role, model = %entry.model, "Circuit open, skipping model");
                AttemptOutcome::Skipped
            } else {
                self.attempt(role, &entry, &request, state.attempts + 1, options.timeout)
                    .await
            };

            let (next, step) = advance(&self.policy, state, outcome);
            state = next;
            match step {
                Step::Return(reply) => {
                    return Ok(RoutedReply {
                        reply,
                        role: role.to_string(),
                        model: entry.model.clone(),
                        used_fallback: false,
                        attempts: state.attempts,
                    });
                }
                Step::RetryAfter(backoff) => {
                    warn!(%role, model = %entry.model, attempt = state.attempts, ?backoff, "Retrying after backoff");
                    tokio::time::sleep(backoff).await;
                }
                Step::Exhausted => break,
            }
        }

        let primary_failure = match state.last_error.clone() {
            Some(last) if !state.skipped || state.attempts > 0 => RouteError::Exhausted {
                role: role.to_string(),
                attempts: state.attempts,
                last,
            },
            _ => RouteError::CircuitOpen {
                model: entry.model.clone(),
            },
        };

        let Some(fallback_role) = options.fallback_role.as_deref() else {
            return Err(primary_failure);
        };
        let Some(fallback) = snapshot.resolve(fallback_role) else {
            warn!(%role, %fallback_role, "Fallback role not in registry");
            return Err(primary_failure);
        };
        if self.circuit.is_open(&fallback.model) {
            warn!(%fallback_role, model = %fallback.model, "Fallback circuit open");
            return Err(RouteError::CircuitOpen {
                model: fallback.model.clone(),
            });
        }

        info!(%role, %fallback_role, model = %fallback.model, "Trying fallback");
        let attempt_index = state.attempts + 1;
        match self
            .attempt(fallback_role, &fallback, &request, attempt_index, options.timeout)
            .await
        {
            AttemptOutcome::Succeeded(reply) => Ok(RoutedReply {
                reply,
                role: fallback_role.to_string(),
                model: fallback.model.clone(),
                used_fallback: true,
                attempts: attempt_index,
            }),
            AttemptOutcome::Failed(last) => Err(RouteError::Exhausted {
                role: fallback_role.to_string(),
                attempts: attempt_index,
                last,
            }),
            AttemptOutcome::Skipped => Err(RouteError::CircuitOpen {
                model: fallback.model.clone(),
            }),
        }
    }

    /// Route several independent calls concurrently, results in input order
    pub async fn route_all(&self, calls: &[RouteCall], options: &RouteOptions) -> Vec<Option<ModelReply>> {
        debug!(count = calls.len(), "route_all: called");
        join_all(
            calls
                .iter()
                .map(|c| self.route(&c.role, &c.system, &c.user, options)),
        )
        .await
    }

    async fn attempt(
        &self,
        role: &str,
        entry: &RegistryEntry,
        request: &ModelRequest,
        attempt: u32,
        timeout: Duration,
    ) -> AttemptOutcome {
        debug!(%role, model = %entry.model, %attempt, "attempt: called");
        let start = Instant::now();
        let result = match tokio::time::timeout(timeout, self.client.call(entry, request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(timeout)),
        };
        let elapsed = start.elapsed();

        self.metrics.record(CallRecord::new(
            role,
            &entry.model,
            attempt,
            elapsed,
            result.is_ok(),
            request.token_estimate(),
        ));

        match result {
            Ok(reply) => {
                self.circuit.record_success(&entry.model);
                info!(%role, model = %entry.model, %attempt, outcome = "success", elapsed_ms = elapsed.as_millis() as u64, "Model call");
                AttemptOutcome::Succeeded(reply)
            }
            Err(e) => {
                let failures = self.circuit.record_failure(&entry.model);
                warn!(%role, model = %entry.model, %attempt, outcome = ?e.kind(), error = %e, %failures, "Model call");
                AttemptOutcome::Failed(e)
            }
        }
    }
}
