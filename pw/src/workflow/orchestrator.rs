//! Workflow orchestrator

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Requester, ReviewError, ReviewStore, WorkflowOutcome, WorkflowState, WorkflowStatus};
use crate::budget::{ContextItem, allocate, attach};
use crate::config::WorkflowConfig;
use crate::plan::{ParsedReply, PlanningDocument, ensure_element_ids, normalize, parse_reply, to_document};
use crate::prompts::{GenerationContext, PromptLoader};
use crate::repair::repair;
use crate::router::{RouteOptions, Router};
use crate::validate::{Violation, summarize, unparseable, validate_all};

/// Bookkeeping for one run
struct Run {
    id: String,
    request: String,
    transitions: Vec<WorkflowState>,
    history: Vec<Vec<Violation>>,
    /// Violations left over from every rejected round
    unresolved: Vec<Violation>,
    last_violations: Vec<Violation>,
    last_document: Option<Value>,
    rounds: u32,
    repairs: u32,
    clarifications: u32,
    checkpoint: Option<String>,
}

impl Run {
    fn new(request: &str) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            request: request.to_string(),
            transitions: Vec::new(),
            history: Vec::new(),
            unresolved: Vec::new(),
            last_violations: Vec::new(),
            last_document: None,
            rounds: 0,
            repairs: 0,
            clarifications: 0,
            checkpoint: None,
        }
    }

    fn enter(&mut self, state: WorkflowState) {
        info!(run_id = %self.id, %state, round = self.rounds, "Workflow transition");
        self.transitions.push(state);
    }

    fn record(&mut self, violations: &[Violation]) {
        if violations.is_empty() {
            return;
        }
        self.history.push(violations.to_vec());
        self.last_violations = violations.to_vec();
    }

    fn finish(mut self, status: WorkflowStatus, document: Option<PlanningDocument>, error: Option<String>) -> WorkflowOutcome {
        self.enter(status.state());
        if let Some(e) = &error {
            warn!(run_id = %self.id, %status, error = %e, "Workflow stopped");
        }
        let violations = if status.is_success() { Vec::new() } else { self.last_violations };
        WorkflowOutcome {
            run_id: self.id,
            status,
            document,
            last_document: self.last_document,
            violations,
            violation_history: self.history,
            rounds: self.rounds,
            repairs: self.repairs,
            clarifications: self.clarifications,
            transitions: self.transitions,
            checkpoint: self.checkpoint,
            error,
        }
    }

    fn fail(self, error: impl Into<String>) -> WorkflowOutcome {
        self.finish(WorkflowStatus::Failed, None, Some(error.into()))
    }

    fn cancel(self) -> WorkflowOutcome {
        self.finish(WorkflowStatus::Cancelled, None, Some("Cancelled".to_string()))
    }
}

/// Resolves once the cancel flag is set; never resolves without a receiver
async fn cancelled(rx: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = rx {
        let fired = rx.wait_for(|c| *c).await.is_ok();
        if fired {
            return;
        }
    }
    std::future::pending::<()>().await
}

/// Drives one planning request to a terminal state
pub struct Orchestrator {
    router: Arc<Router>,
    prompts: PromptLoader,
    store: Arc<dyn ReviewStore>,
    requester: Arc<dyn Requester>,
    config: WorkflowConfig,
    options: RouteOptions,
    context: Vec<ContextItem>,
    cancel: Option<watch::Receiver<bool>>,
}

impl Orchestrator {
    pub fn new(
        router: Arc<Router>,
        prompts: PromptLoader,
        store: Arc<dyn ReviewStore>,
        requester: Arc<dyn Requester>,
        config: WorkflowConfig,
    ) -> Self {
        debug!(role = %config.role, max_rounds = config.max_rounds, "Orchestrator::new: called");
        Self {
            router,
            prompts,
            store,
            requester,
            config,
            options: RouteOptions::default(),
            context: Vec::new(),
            cancel: None,
        }
    }

    pub fn with_route_options(mut self, options: RouteOptions) -> Self {
        self.options = options;
        self
    }

    /// Supplementary content fitted into the role's budget each round
    pub fn with_context(mut self, items: Vec<ContextItem>) -> Self {
        self.context = items;
        self
    }

    /// Stop the run when the flag flips to true
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run the workflow for `request` until a terminal state
    pub async fn run(&self, request: &str) -> WorkflowOutcome {
        let mut run = Run::new(request);
        info!(run_id = %run.id, role = %self.config.role, "Starting planning workflow");

        let system = match self.prompts.system_prompt() {
            Ok(s) => s,
            Err(e) => return run.fail(e.to_string()),
        };
        let mut guidance: Option<String> = None;

        let document = loop {
            if self.is_cancelled() {
                return run.cancel();
            }
            if run.rounds >= self.config.max_rounds {
                let rounds = run.rounds;
                return run.fail(format!("No valid document after {} round(s)", rounds));
            }
            run.rounds += 1;
            run.enter(WorkflowState::Generate);

            let user = match self.render_prompt(&run, guidance.as_deref()) {
                Ok(u) => u,
                Err(e) => return run.fail(e.to_string()),
            };
            let routed = tokio::select! {
                reply = self.router.route(&self.config.role, &system, &user, &self.options) => Some(reply),
                _ = cancelled(self.cancel.clone()) => None,
            };
            let Some(reply) = routed else {
                return run.cancel();
            };
            let Some(reply) = reply else {
                return run.fail(format!("No reply from role '{}'", self.config.role));
            };

            match parse_reply(&reply.content) {
                ParsedReply::Clarification(question) => {
                    run.enter(WorkflowState::NeedsClarification);
                    if run.clarifications >= self.config.max_clarifications {
                        return run.fail(format!(
                            "Clarification limit ({}) reached; last question: {}",
                            self.config.max_clarifications, question
                        ));
                    }
                    run.clarifications += 1;
                    info!(run_id = %run.id, %question, "Model asked for clarification");

                    let asked = tokio::select! {
                        answer = self.requester.ask(&question) => Some(answer),
                        _ = cancelled(self.cancel.clone()) => None,
                    };
                    match asked {
                        None => return run.cancel(),
                        Some(Err(e)) => return run.fail(e.to_string()),
                        Some(Ok(answer)) => {
                            run.request
                                .push_str(&format!("\n\nClarification: {}\nAnswer: {}", question, answer));
                        }
                    }
                }
                ParsedReply::Unparseable(reason) => {
                    run.enter(WorkflowState::Invalid);
                    let violations = vec![unparseable(reason)];
                    run.record(&violations);
                    run.unresolved.extend(violations);
                    run.enter(WorkflowState::StillInvalid);
                    guidance = Some(summarize(&run.unresolved));
                }
                ParsedReply::Document(mut doc) => {
                    normalize(&mut doc, Some(&run.request));
                    ensure_element_ids(&mut doc);
                    run.last_document = Some(doc.clone());

                    let violations = validate_all(&doc);
                    if violations.is_empty() {
                        run.enter(WorkflowState::Valid);
                        break doc;
                    }
                    run.enter(WorkflowState::Invalid);
                    run.record(&violations);

                    match self.repair_loop(&mut run, doc, violations) {
                        Ok(doc) => {
                            run.enter(WorkflowState::Valid);
                            break doc;
                        }
                        Err(remaining) => {
                            run.enter(WorkflowState::StillInvalid);
                            run.unresolved.extend(remaining);
                            guidance = Some(summarize(&run.unresolved));
                        }
                    }
                }
            }
        };

        self.review(run, document).await
    }

    fn render_prompt(&self, run: &Run, guidance: Option<&str>) -> eyre::Result<String> {
        let mut ctx = GenerationContext::new(run.request.clone());
        if !self.context.is_empty()
            && let Some(entry) = self.router.registry().snapshot().resolve(&self.config.role)
        {
            let allocation = allocate(&self.config.role, entry.context_window);
            let attached = attach(&allocation, &self.context);
            debug!(used_tokens = attached.used_tokens, truncated = attached.truncated(), "render_prompt: attached context");
            ctx = ctx.with_context(attached.text);
        }
        if let Some(guidance) = guidance {
            ctx = ctx.with_guidance(run.rounds.saturating_sub(1), guidance);
        }
        self.prompts.generation_prompt(&ctx)
    }

    /// Repair and re-validate until clean, stuck, or out of attempts
    fn repair_loop(&self, run: &mut Run, mut doc: Value, mut violations: Vec<Violation>) -> Result<Value, Vec<Violation>> {
        for attempt in 1..=self.config.max_repair_attempts {
            run.enter(WorkflowState::RepairAttempt);
            run.repairs += 1;

            let outcome = repair(&doc, &violations);
            if !outcome.changed {
                debug!(%attempt, "repair_loop: nothing repairable");
                break;
            }
            doc = outcome.document;
            ensure_element_ids(&mut doc);
            run.last_document = Some(doc.clone());

            violations = validate_all(&doc);
            if violations.is_empty() {
                info!(run_id = %run.id, %attempt, "Repair produced a valid document");
                return Ok(doc);
            }
            run.record(&violations);
        }
        Err(violations)
    }

    async fn wait_for_review(&self, run_id: &str) -> Result<(), ReviewError> {
        let wait = self.store.wait_for_review(run_id);
        let limited = async {
            match self.config.review_timeout_ms.map(Duration::from_millis) {
                Some(limit) => tokio::time::timeout(limit, wait)
                    .await
                    .unwrap_or(Err(ReviewError::TimedOut(limit))),
                None => wait.await,
            }
        };
        tokio::select! {
            result = limited => result,
            _ = cancelled(self.cancel.clone()) => Err(ReviewError::Cancelled),
        }
    }

    async fn review(&self, mut run: Run, document: Value) -> WorkflowOutcome {
        run.enter(WorkflowState::HumanReviewWrite);
        match self.store.write_snapshot(&run.id, &document).await {
            Ok(location) => run.checkpoint = Some(location),
            Err(e) => return run.fail(e.to_string()),
        }

        match self.wait_for_review(&run.id).await {
            Ok(()) => {}
            Err(ReviewError::Cancelled) => return run.cancel(),
            Err(e) => return run.fail(e.to_string()),
        }

        run.enter(WorkflowState::HumanReviewRead);
        let reloaded = match self.store.read_snapshot(&run.id).await {
            Ok(doc) => doc,
            Err(e) => {
                let message = e.to_string();
                run.record(&[unparseable(message.clone())]);
                return run.finish(WorkflowStatus::ReviewFailed, None, Some(message));
            }
        };
        run.last_document = Some(reloaded.clone());

        let violations = validate_all(&reloaded);
        if !violations.is_empty() {
            warn!(run_id = %run.id, count = violations.len(), "Reviewed document failed validation");
            run.record(&violations);
            return run.finish(WorkflowStatus::ReviewFailed, None, None);
        }

        match to_document(&reloaded) {
            Ok(doc) => {
                info!(run_id = %run.id, features = doc.feature_count(), "Planning document finalized");
                run.finish(WorkflowStatus::Final, Some(doc), None)
            }
            Err(e) => {
                run.record(&[unparseable(e.to_string())]);
                run.finish(WorkflowStatus::ReviewFailed, None, Some(e.to_string()))
            }
        }
    }
}
