//! Agent loop runner - drives observe → prompt → model → adapt → policy →
//! execute until the task needs someone else.
//!
//! The runner owns the collaborators; the orchestrator it shares owns the
//! state. `run` returns a [`RunPause`] whenever the loop cannot continue on
//! its own, and the caller resumes it through `approve_pending`, `answer`,
//! `resume` or a fresh `run`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use action_primitives::{ExecutionEngine, LivePage};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tabpilot_core_types::{
    ActionPlan, ActionStep, AskUserBlock, CheckpointBlock, ExecutionResult, FlowState, LoopEntry,
    TabId, TaskCompleteBlock,
};
use tabpilot_policy_center::{AuditEntry, AuditTrail, PolicyCenter, PolicyTier, PolicyVerdict};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::OrchestratorConfig;
use super::orchestrator::{TaskOrchestrator, TaskPhase, TaskState};
use super::prompt::{DefaultPromptAssembler, PromptAssembler, PromptContext};
use crate::adapter::{
    adapt_response, tool_history_records, user_message, ParsedToolResult, ProviderResponse,
    WireFormat,
};
use crate::errors::AgentError;
use crate::llm_provider::ModelClient;
use crate::model::ModelRequest;
use crate::observer::PageObserver;
use crate::session::{SessionBuffers, SessionEvent};

/// Outcome recorded when the user turns down a confirm-tier action.
pub const DECLINED_BY_USER: &str = "Action declined by user";

/// Why `run` handed control back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "pause", rename_all = "snake_case")]
pub enum RunPause {
    Completed { block: TaskCompleteBlock },
    Checkpoint { block: CheckpointBlock },
    AwaitingApproval { step: ActionStep, verdict: PolicyVerdict },
    NeedsUser { block: AskUserBlock },
    BudgetExhausted { loops: u32 },
    Aborted { reason: String },
    Failed { status: String },
}

impl RunPause {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunPause::Completed { .. }
                | RunPause::BudgetExhausted { .. }
                | RunPause::Aborted { .. }
                | RunPause::Failed { .. }
        )
    }
}

/// Cloneable handle for aborting a task from outside the runner.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    orchestrator: Arc<Mutex<TaskOrchestrator>>,
}

impl AbortHandle {
    pub fn abort(&self, reason: &str) {
        self.orchestrator.lock().abort(reason);
    }
}

/// One iteration's plan while it is being executed.
struct InFlight {
    epoch: u64,
    token: CancellationToken,
    response: ProviderResponse,
    user_turn: Value,
    plan: ActionPlan,
    next_index: usize,
    results: Vec<ExecutionResult>,
    page_url: String,
    flow: Option<FlowState>,
}

struct PendingApproval {
    inflight: InFlight,
    verdict: PolicyVerdict,
}

pub struct AgentRunner {
    config: OrchestratorConfig,
    orchestrator: Arc<Mutex<TaskOrchestrator>>,
    model: Arc<dyn ModelClient>,
    observer: Arc<dyn PageObserver>,
    engine: Arc<ExecutionEngine>,
    policy: Arc<PolicyCenter>,
    audit: AuditTrail,
    prompts: Arc<dyn PromptAssembler>,
    sessions: Arc<SessionBuffers>,
    tab: TabId,
    format: WireFormat,
    conversation: VecDeque<Vec<Value>>,
    pending: Option<PendingApproval>,
    consecutive_failures: u32,
    last_problem: Option<String>,
}

impl AgentRunner {
    pub fn new(
        orchestrator: TaskOrchestrator,
        model: Arc<dyn ModelClient>,
        observer: Arc<dyn PageObserver>,
        engine: Arc<ExecutionEngine>,
        policy: Arc<PolicyCenter>,
    ) -> Self {
        let format = WireFormat::for_model(model.model_id());
        Self {
            config: orchestrator.config().clone(),
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            model,
            observer,
            engine,
            policy,
            audit: AuditTrail::default(),
            prompts: Arc::new(DefaultPromptAssembler::default()),
            sessions: Arc::new(SessionBuffers::default()),
            tab: TabId::new("tab-1"),
            format,
            conversation: VecDeque::new(),
            pending: None,
            consecutive_failures: 0,
            last_problem: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditTrail) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_sessions(mut self, sessions: Arc<SessionBuffers>, tab: TabId) -> Self {
        self.sessions = sessions;
        self.tab = tab;
        self
    }

    pub fn with_prompts(mut self, prompts: Arc<dyn PromptAssembler>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            orchestrator: Arc::clone(&self.orchestrator),
        }
    }

    pub fn orchestrator(&self) -> Arc<Mutex<TaskOrchestrator>> {
        Arc::clone(&self.orchestrator)
    }

    pub fn state(&self) -> TaskState {
        self.orchestrator.lock().state().clone()
    }

    pub fn history_digest(&self) -> String {
        self.orchestrator.lock().summarize_history()
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn sessions(&self) -> &Arc<SessionBuffers> {
        &self.sessions
    }

    pub fn tab(&self) -> &TabId {
        &self.tab
    }

    /// Start a new task, dropping the previous conversation.
    pub fn start(&mut self, goal: &str) -> Result<(), AgentError> {
        self.orchestrator.lock().start_task(goal)?;
        self.conversation.clear();
        self.pending = None;
        self.consecutive_failures = 0;
        self.last_problem = None;
        Ok(())
    }

    pub fn abort(&mut self, reason: &str) {
        self.pending = None;
        self.orchestrator.lock().abort(reason);
    }

    /// Answer the pending clarifying question.
    pub fn answer(&mut self, answer: &str) -> Result<(), AgentError> {
        self.orchestrator.lock().answer_clarification(answer)
    }

    /// Leave a checkpoint and continue executing.
    pub fn resume(&mut self) -> Result<(), AgentError> {
        self.orchestrator.lock().resume_from_checkpoint()
    }

    /// Drive the loop until it pauses.
    pub async fn run(&mut self) -> Result<RunPause, AgentError> {
        loop {
            let stale = self
                .pending
                .as_ref()
                .is_some_and(|pending| self.is_stale(pending.inflight.epoch));
            if stale {
                debug!("Dropping approval request from an aborted task");
                self.pending = None;
            }
            if let Some(pending) = &self.pending {
                let step = pending.inflight.plan.actions[pending.inflight.next_index].clone();
                return Ok(RunPause::AwaitingApproval {
                    step,
                    verdict: pending.verdict.clone(),
                });
            }
            if let Some(pause) = self.settled_pause()? {
                return Ok(pause);
            }
            if let Some(pause) = self.turn().await? {
                return Ok(pause);
            }
        }
    }

    /// Approve or decline the action waiting for confirmation, then keep
    /// running.
    pub async fn approve_pending(&mut self, approved: bool) -> Result<RunPause, AgentError> {
        let PendingApproval {
            mut inflight,
            verdict,
        } = self
            .pending
            .take()
            .ok_or_else(|| AgentError::invalid_request("no action is awaiting approval"))?;
        if self.is_stale(inflight.epoch) {
            return self.run().await;
        }

        let step = inflight.plan.actions[inflight.next_index].clone();
        info!(action = %step.action, selector = %step.selector, approved, "Approval decision");
        let result = if approved {
            let result = self.execute(&step, &inflight).await;
            if self.is_stale(inflight.epoch) {
                warn!("Discarding execution result that finished after abort");
                return self.run().await;
            }
            result
        } else {
            ExecutionResult::failure(&step, DECLINED_BY_USER, 0)
        };
        self.audit.record(
            AuditEntry::new(&step, Some(&inflight.page_url), &verdict)
                .with_approval(approved)
                .with_result(&result),
        );

        let succeeded = result.success;
        self.record_result(&mut inflight, result)?;
        let pause = if succeeded {
            self.continue_plan(inflight).await?
        } else {
            self.finish_iteration(inflight).await?
        };
        match pause {
            Some(pause) => Ok(pause),
            None => self.run().await,
        }
    }

    /// Pause implied by the current phase, if the loop cannot continue.
    fn settled_pause(&mut self) -> Result<Option<RunPause>, AgentError> {
        let mut orch = self.orchestrator.lock();
        match orch.phase() {
            TaskPhase::Executing => return Ok(None),
            TaskPhase::Observing => {
                orch.begin_execution()?;
                return Ok(None);
            }
            TaskPhase::Idle if orch.state().task_id.is_none() => {
                return Err(AgentError::transition("run", TaskPhase::Idle));
            }
            _ => {}
        }

        let exhausted = orch.budget_exhausted();
        let state = orch.state();
        let pause = match state.phase {
            TaskPhase::Completed => Some(RunPause::Completed {
                block: state
                    .completion
                    .clone()
                    .unwrap_or_else(|| TaskCompleteBlock::new(state.status_message.clone())),
            }),
            TaskPhase::Error if exhausted => Some(RunPause::BudgetExhausted {
                loops: state.loop_count,
            }),
            TaskPhase::Error => Some(RunPause::Failed {
                status: state.status_message.clone(),
            }),
            TaskPhase::Checkpoint => state
                .checkpoint
                .clone()
                .map(|block| RunPause::Checkpoint { block }),
            TaskPhase::Clarifying => state
                .pending_question
                .clone()
                .map(|block| RunPause::NeedsUser { block }),
            _ => Some(RunPause::Aborted {
                reason: state.status_message.clone(),
            }),
        };
        Ok(pause)
    }

    /// One model turn. `None` means keep looping.
    async fn turn(&mut self) -> Result<Option<RunPause>, AgentError> {
        let (epoch, token, phase, prompt_parts) = {
            let orch = self.orchestrator.lock();
            let state = orch.state();
            (
                orch.epoch(),
                orch.cancel_token(),
                state.phase,
                (
                    state.goal.clone(),
                    state.clarifications.clone(),
                    state.loop_count,
                    state.max_loops,
                    orch.summarize_history(),
                    orch.is_stuck(),
                ),
            )
        };
        let (goal, clarifications, loop_count, max_loops, digest, stuck) = prompt_parts;

        let snapshot = self.observer.snapshot().await;
        for line in self.observer.drain_console().await {
            self.sessions
                .record(&self.tab, SessionEvent::console(line.level, line.text));
        }
        let console_errors = self
            .sessions
            .recent_console_errors(&self.tab, self.config.console_error_limit);
        if stuck {
            warn!(
                loops = loop_count,
                window = self.config.stuck_window,
                "No progress detected over recent iterations"
            );
        }

        let mut user_text = self.prompts.user_message(&PromptContext {
            goal: &goal,
            phase,
            clarifications: &clarifications,
            snapshot: snapshot.as_ref(),
            history_digest: &digest,
            loop_count,
            max_loops,
            stuck,
            console_errors: &console_errors,
        });
        if let Some(problem) = self.last_problem.take() {
            user_text.push_str(&format!(
                "\n## Last Response Problem\n{problem}\nRespond with exactly one tool call.\n"
            ));
        }
        let user_turn = user_message(self.format, &user_text);
        let request = ModelRequest::new(self.format, self.prompts.system_prompt())
            .with_messages(self.conversation.iter().flatten().cloned())
            .with_messages([user_turn.clone()]);

        debug!(
            model = self.model.model_id(),
            phase = %phase,
            messages = request.messages.len(),
            "Calling model"
        );
        let timeout_ms = self.config.model_timeout_ms;
        let outcome = tokio::select! {
            _ = token.cancelled() => {
                debug!("Model call cancelled");
                return Ok(None);
            }
            outcome = tokio::time::timeout(
                Duration::from_millis(timeout_ms),
                self.model.complete(&request),
            ) => outcome,
        };
        if self.is_stale(epoch) {
            warn!("Discarding model response that arrived after abort");
            return Ok(None);
        }

        let raw = match outcome {
            Err(_) => return self.note_failure(epoch, AgentError::ModelTimeout(timeout_ms).to_string()),
            Ok(Err(err)) => return self.note_failure(epoch, err.to_string()),
            Ok(Ok(raw)) => raw,
        };
        let response = match ProviderResponse::from_raw_as(self.format, raw) {
            Ok(response) => response,
            Err(err) => return self.note_failure(epoch, err.to_string()),
        };

        let parsed = adapt_response(&response);
        debug!(kind = parsed.kind(), "Model turn adapted");
        match parsed {
            ParsedToolResult::Error { error } => self.note_failure(epoch, error),
            ParsedToolResult::TaskReady { summary } => {
                if phase != TaskPhase::Clarifying {
                    return self.note_failure(
                        epoch,
                        "task_ready is only valid before execution starts".to_string(),
                    );
                }
                self.consecutive_failures = 0;
                info!(summary = %summary, "Task ready, starting execution");
                self.push_turn(user_turn, &response, "Starting execution");
                self.guarded(epoch, |orch| orch.begin_execution())?;
                Ok(None)
            }
            ParsedToolResult::AskUser { block } => {
                self.consecutive_failures = 0;
                self.push_turn(user_turn, &response, "Question passed to the user");
                let asked = block.clone();
                Ok(self
                    .guarded(epoch, |orch| orch.await_user(asked))?
                    .map(|_| RunPause::NeedsUser { block }))
            }
            ParsedToolResult::Checkpoint { block } => {
                self.consecutive_failures = 0;
                self.push_turn(user_turn, &response, "Paused for the user");
                let raised = block.clone();
                Ok(self
                    .guarded(epoch, |orch| {
                        if orch.phase() == TaskPhase::Clarifying {
                            orch.begin_execution()?;
                        }
                        orch.checkpoint(raised)
                    })?
                    .map(|_| RunPause::Checkpoint { block }))
            }
            ParsedToolResult::Complete { block } => {
                self.consecutive_failures = 0;
                let done = block.clone();
                Ok(self
                    .guarded(epoch, |orch| orch.complete(done))?
                    .map(|_| RunPause::Completed { block }))
            }
            ParsedToolResult::Action { plan } => {
                self.consecutive_failures = 0;
                let installed = plan.clone();
                let ready = self.guarded(epoch, |orch| {
                    if orch.phase() == TaskPhase::Clarifying {
                        orch.begin_execution()?;
                    }
                    orch.set_plan(installed)
                })?;
                if ready.is_none() {
                    return Ok(None);
                }
                let page_url = match &snapshot {
                    Some(snapshot) => snapshot.url.clone(),
                    None => self.engine.page().url().await.unwrap_or_default(),
                };
                let inflight = InFlight {
                    epoch,
                    token,
                    response,
                    user_turn,
                    plan,
                    next_index: 0,
                    results: Vec::new(),
                    page_url,
                    flow: snapshot.and_then(|s| s.flow),
                };
                self.continue_plan(inflight).await
            }
        }
    }

    /// Run the remaining steps of the plan through policy and the engine.
    async fn continue_plan(&mut self, mut inflight: InFlight) -> Result<Option<RunPause>, AgentError> {
        while inflight.next_index < inflight.plan.actions.len() {
            let step = inflight.plan.actions[inflight.next_index].clone();
            let verdict = self.policy.evaluate(&step, Some(&inflight.page_url));
            match verdict.tier {
                PolicyTier::Block => {
                    warn!(
                        action = %step.action,
                        selector = %step.selector,
                        reason = %verdict.reason,
                        "Action blocked by policy"
                    );
                    let result = ExecutionResult::failure(
                        &step,
                        format!("Blocked by policy: {}", verdict.reason),
                        0,
                    );
                    self.audit.record(
                        AuditEntry::new(&step, Some(&inflight.page_url), &verdict)
                            .with_result(&result),
                    );
                    self.record_result(&mut inflight, result)?;
                    break;
                }
                PolicyTier::Confirm => {
                    info!(
                        action = %step.action,
                        selector = %step.selector,
                        risk = %verdict.effective_risk(),
                        "Action needs confirmation"
                    );
                    let pause = RunPause::AwaitingApproval {
                        step,
                        verdict: verdict.clone(),
                    };
                    self.pending = Some(PendingApproval { inflight, verdict });
                    return Ok(Some(pause));
                }
                PolicyTier::Auto => {
                    let result = self.execute(&step, &inflight).await;
                    if self.is_stale(inflight.epoch) {
                        warn!("Discarding execution result that finished after abort");
                        return Ok(None);
                    }
                    self.audit.record(
                        AuditEntry::new(&step, Some(&inflight.page_url), &verdict)
                            .with_result(&result),
                    );
                    let succeeded = result.success;
                    self.record_result(&mut inflight, result)?;
                    if !succeeded {
                        break;
                    }
                }
            }
        }
        self.finish_iteration(inflight).await
    }

    async fn execute(&self, step: &ActionStep, inflight: &InFlight) -> ExecutionResult {
        self.engine.execute(step, &inflight.token).await
    }

    fn record_result(
        &mut self,
        inflight: &mut InFlight,
        result: ExecutionResult,
    ) -> Result<(), AgentError> {
        let step = &inflight.plan.actions[inflight.next_index];
        self.sessions.record(
            &self.tab,
            SessionEvent::action(
                result.success,
                format!("{}: {}", step.label(), result.outcome_line()),
            ),
        );
        let recorded = result.clone();
        self.guarded(inflight.epoch, |orch| orch.record_step_result(recorded))?;
        inflight.results.push(result);
        inflight.next_index += 1;
        Ok(())
    }

    /// Close the iteration: thread the conversation and count the loop.
    async fn finish_iteration(&mut self, inflight: InFlight) -> Result<Option<RunPause>, AgentError> {
        let outcome = if inflight.results.is_empty() {
            "No action was executed".to_string()
        } else {
            inflight
                .results
                .iter()
                .map(ExecutionResult::outcome_line)
                .collect::<Vec<_>>()
                .join("; ")
        };
        self.push_turn(inflight.user_turn, &inflight.response, &outcome);

        let mut entry = LoopEntry::new(0, inflight.page_url, inflight.plan, inflight.results);
        if let Some(flow) = inflight.flow {
            entry = entry.with_flow(flow);
        }
        let (continues, loops) = match self.guarded(inflight.epoch, |orch| {
            let continues = orch.complete_loop(entry)?;
            Ok((continues, orch.state().loop_count))
        })? {
            Some(done) => done,
            None => return Ok(None),
        };
        if !continues {
            return Ok(Some(RunPause::BudgetExhausted { loops }));
        }

        let pause = self.config.wait_between_steps_ms;
        if pause > 0 {
            tokio::select! {
                _ = inflight.token.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_millis(pause)) => {}
            }
        }
        Ok(None)
    }

    fn push_turn(&mut self, user_turn: Value, response: &ProviderResponse, outcome: &str) {
        let mut turn = vec![user_turn];
        turn.extend(tool_history_records(response, outcome));
        self.conversation.push_back(turn);
        while self.conversation.len() > self.config.conversation_turns {
            self.conversation.pop_front();
        }
    }

    fn note_failure(&mut self, epoch: u64, problem: String) -> Result<Option<RunPause>, AgentError> {
        self.consecutive_failures += 1;
        warn!(
            failures = self.consecutive_failures,
            limit = self.config.max_consecutive_failures,
            problem = %problem,
            "Model turn failed"
        );
        if self.consecutive_failures >= self.config.max_consecutive_failures {
            let status = format!(
                "Model failed {} times in a row: {}",
                self.consecutive_failures, problem
            );
            self.guarded(epoch, |orch| orch.fail(status))?;
        }
        self.last_problem = Some(problem);
        Ok(None)
    }

    fn is_stale(&self, epoch: u64) -> bool {
        self.orchestrator.lock().epoch() != epoch
    }

    /// Apply a transition unless the task was aborted since `epoch`.
    fn guarded<T>(
        &self,
        epoch: u64,
        apply: impl FnOnce(&mut TaskOrchestrator) -> Result<T, AgentError>,
    ) -> Result<Option<T>, AgentError> {
        let mut orch = self.orchestrator.lock();
        if orch.epoch() != epoch {
            warn!(epoch, current = orch.epoch(), "Ignoring late transition after abort");
            return Ok(None);
        }
        apply(&mut orch).map(Some)
    }
}
