//! Task Orchestrator - the loop state machine.
//!
//! ```text
//! idle | completed | error --start_task------------> clarifying
//! clarifying | observing  --begin_execution-------> executing
//! executing | observing   --complete_loop---------> observing | error (budget)
//! executing | observing   --checkpoint------------> checkpoint
//! checkpoint              --resume_from_checkpoint> executing
//! clarifying | executing | observing --await_user-> clarifying
//! any active phase        --complete--------------> completed
//! any phase               --abort-----------------> idle
//! ```
//!
//! The orchestrator only holds bookkeeping. Driving the loop is the
//! runner's job; every transition here is synchronous and cheap.

use serde::{Deserialize, Serialize};
use std::fmt;
use tabpilot_core_types::{
    ActionPlan, ActionStep, AskUserBlock, CheckpointBlock, ExecutionResult, LoopEntry,
    TaskCompleteBlock, TaskId,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::OrchestratorConfig;
use super::digest;
use crate::errors::AgentError;

/// Status message set when the loop budget runs out.
pub const BUDGET_EXHAUSTED: &str = "Loop budget exhausted";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    #[default]
    Idle,
    Clarifying,
    Executing,
    Observing,
    Checkpoint,
    Completed,
    Error,
}

impl TaskPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPhase::Idle => "idle",
            TaskPhase::Clarifying => "clarifying",
            TaskPhase::Executing => "executing",
            TaskPhase::Observing => "observing",
            TaskPhase::Checkpoint => "checkpoint",
            TaskPhase::Completed => "completed",
            TaskPhase::Error => "error",
        }
    }

    /// Phases in which a task is in progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TaskPhase::Clarifying
                | TaskPhase::Executing
                | TaskPhase::Observing
                | TaskPhase::Checkpoint
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskPhase::Completed | TaskPhase::Error)
    }
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A question put to the user and the answer they gave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clarification {
    pub question: String,
    pub answer: String,
}

/// State of the active task. Reset on every `start_task`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskState {
    pub task_id: Option<TaskId>,
    pub phase: TaskPhase,
    pub goal: String,
    pub clarifications: Vec<Clarification>,
    pub pending_question: Option<AskUserBlock>,
    pub loop_count: u32,
    pub max_loops: u32,
    pub history: Vec<LoopEntry>,
    pub pending_plan: Option<ActionPlan>,
    pub current_step_index: usize,
    pub step_results: Vec<ExecutionResult>,
    pub checkpoint: Option<CheckpointBlock>,
    pub completion: Option<TaskCompleteBlock>,
    pub status_message: String,
}

/// Owns one task's state, its cancellation token and the abort epoch.
#[derive(Debug)]
pub struct TaskOrchestrator {
    config: OrchestratorConfig,
    state: TaskState,
    cancel: CancellationToken,
    epoch: u64,
}

impl TaskOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            state: TaskState::default(),
            cancel: CancellationToken::new(),
            epoch: 0,
        }
    }

    pub fn default_config() -> Self {
        Self::new(OrchestratorConfig::default())
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    pub fn phase(&self) -> TaskPhase {
        self.state.phase
    }

    pub fn history(&self) -> &[LoopEntry] {
        &self.state.history
    }

    /// Token for the current epoch. Replaced on every abort.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Incremented on every abort; lets late completions detect they are stale.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn require(&self, op: &'static str, allowed: &[TaskPhase]) -> Result<(), AgentError> {
        if allowed.contains(&self.state.phase) {
            Ok(())
        } else {
            Err(AgentError::transition(op, self.state.phase))
        }
    }

    fn enter(&mut self, phase: TaskPhase, status: impl Into<String>) {
        let status = status.into();
        debug!(from = %self.state.phase, to = %phase, status = %status, "Task phase change");
        self.state.phase = phase;
        self.state.status_message = status;
    }

    /// `idle | completed | error → clarifying`, resetting everything.
    pub fn start_task(&mut self, goal: &str) -> Result<(), AgentError> {
        self.require(
            "start a task",
            &[TaskPhase::Idle, TaskPhase::Completed, TaskPhase::Error],
        )?;
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(AgentError::invalid_request("goal must not be empty"));
        }

        let max_loops = self.config.budget.max_loops_for(goal);
        let task_id = TaskId::new();
        info!(task_id = %task_id, max_loops, "Starting task");

        self.state = TaskState {
            task_id: Some(task_id),
            goal: goal.to_string(),
            max_loops,
            ..TaskState::default()
        };
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        self.enter(TaskPhase::Clarifying, "Clarifying task");
        Ok(())
    }

    /// `clarifying | observing → executing`. From observing this opens the
    /// next iteration.
    pub fn begin_execution(&mut self) -> Result<(), AgentError> {
        self.require(
            "begin execution",
            &[TaskPhase::Clarifying, TaskPhase::Observing],
        )?;
        if self.state.pending_question.is_some() {
            return Err(AgentError::invalid_request(
                "a clarifying question is still unanswered",
            ));
        }
        self.clear_iteration();
        let status = format!(
            "Executing iteration {} of {}",
            self.state.loop_count + 1,
            self.state.max_loops
        );
        self.enter(TaskPhase::Executing, status);
        Ok(())
    }

    fn clear_iteration(&mut self) {
        self.state.pending_plan = None;
        self.state.current_step_index = 0;
        self.state.step_results.clear();
    }

    /// Install the plan for the current iteration. No phase change.
    pub fn set_plan(&mut self, plan: ActionPlan) -> Result<(), AgentError> {
        self.require("set a plan", &[TaskPhase::Executing])?;
        self.state.pending_plan = Some(plan);
        self.state.current_step_index = 0;
        self.state.step_results.clear();
        Ok(())
    }

    /// Record the outcome of the current step and advance. No phase change.
    pub fn record_step_result(&mut self, result: ExecutionResult) -> Result<(), AgentError> {
        self.require("record a step result", &[TaskPhase::Executing])?;
        self.state.step_results.push(result);
        self.state.current_step_index += 1;
        Ok(())
    }

    /// Next step of the pending plan, if any remains.
    pub fn current_step(&self) -> Option<&ActionStep> {
        self.state
            .pending_plan
            .as_ref()
            .and_then(|plan| plan.actions.get(self.state.current_step_index))
    }

    /// Append `entry` and count the iteration.
    ///
    /// Returns `false` and moves to `error` once the budget is spent;
    /// otherwise moves to `observing` and returns `true`.
    pub fn complete_loop(&mut self, mut entry: LoopEntry) -> Result<bool, AgentError> {
        self.require(
            "complete an iteration",
            &[TaskPhase::Executing, TaskPhase::Observing],
        )?;
        self.state.loop_count += 1;
        entry.iteration = self.state.loop_count;
        self.state.history.push(entry);
        self.clear_iteration();

        if self.state.loop_count >= self.state.max_loops {
            warn!(
                loops = self.state.loop_count,
                max_loops = self.state.max_loops,
                "Loop budget exhausted"
            );
            self.enter(TaskPhase::Error, BUDGET_EXHAUSTED);
            return Ok(false);
        }

        let status = format!(
            "Observing after iteration {} of {}",
            self.state.loop_count, self.state.max_loops
        );
        self.enter(TaskPhase::Observing, status);
        Ok(true)
    }

    /// `executing | observing → checkpoint`.
    pub fn checkpoint(&mut self, block: CheckpointBlock) -> Result<(), AgentError> {
        self.require("checkpoint", &[TaskPhase::Executing, TaskPhase::Observing])?;
        let status = if block.message.trim().is_empty() {
            format!("Checkpoint: {}", block.reason)
        } else {
            block.message.clone()
        };
        self.state.checkpoint = Some(block);
        self.enter(TaskPhase::Checkpoint, status);
        Ok(())
    }

    /// `checkpoint → executing`.
    pub fn resume_from_checkpoint(&mut self) -> Result<(), AgentError> {
        self.require("resume", &[TaskPhase::Checkpoint])?;
        self.state.checkpoint = None;
        self.clear_iteration();
        self.enter(TaskPhase::Executing, "Resumed from checkpoint");
        Ok(())
    }

    /// Any active phase → `completed`.
    pub fn complete(&mut self, block: TaskCompleteBlock) -> Result<(), AgentError> {
        if !self.state.phase.is_active() {
            return Err(AgentError::transition("complete", self.state.phase));
        }
        let status = if block.summary.trim().is_empty() {
            "Task complete".to_string()
        } else {
            block.summary.clone()
        };
        info!(loops = self.state.loop_count, "Task completed");
        self.state.completion = Some(block);
        self.clear_iteration();
        self.enter(TaskPhase::Completed, status);
        Ok(())
    }

    /// Any active phase → `error` with a descriptive status.
    pub fn fail(&mut self, status: impl Into<String>) -> Result<(), AgentError> {
        if !self.state.phase.is_active() {
            return Err(AgentError::transition("fail", self.state.phase));
        }
        let status = status.into();
        warn!(status = %status, "Task failed");
        self.clear_iteration();
        self.enter(TaskPhase::Error, status);
        Ok(())
    }

    /// Any phase → `idle`. Cancels in-flight work and bumps the epoch.
    ///
    /// Aborting an idle task changes nothing.
    pub fn abort(&mut self, reason: &str) {
        if self.state.phase == TaskPhase::Idle {
            return;
        }
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.epoch += 1;
        info!(epoch = self.epoch, reason, "Task aborted");
        self.clear_iteration();
        self.state.pending_question = None;
        self.state.checkpoint = None;
        let status = if reason.trim().is_empty() {
            "Aborted".to_string()
        } else {
            format!("Aborted: {}", reason.trim())
        };
        self.enter(TaskPhase::Idle, status);
    }

    /// `clarifying | executing | observing → clarifying` with a pending question.
    pub fn await_user(&mut self, block: AskUserBlock) -> Result<(), AgentError> {
        self.require(
            "ask the user",
            &[
                TaskPhase::Clarifying,
                TaskPhase::Executing,
                TaskPhase::Observing,
            ],
        )?;
        let status = format!("Waiting for user: {}", block.question);
        self.state.pending_question = Some(block);
        self.clear_iteration();
        self.enter(TaskPhase::Clarifying, status);
        Ok(())
    }

    /// File the user's answer to the pending question.
    pub fn answer_clarification(&mut self, answer: &str) -> Result<(), AgentError> {
        self.require("answer a question", &[TaskPhase::Clarifying])?;
        let question = self
            .state
            .pending_question
            .take()
            .ok_or_else(|| AgentError::invalid_request("no question is pending"))?;
        self.state.clarifications.push(Clarification {
            question: question.question,
            answer: answer.trim().to_string(),
        });
        self.state.status_message = "Clarifying task".to_string();
        Ok(())
    }

    /// No progress over the configured window.
    pub fn is_stuck(&self) -> bool {
        digest::is_stuck(&self.state.history, self.config.stuck_window)
    }

    /// History digest over the configured window.
    pub fn summarize_history(&self) -> String {
        digest::summarize_history(&self.state.history, self.config.summary_window)
    }

    pub fn budget_exhausted(&self) -> bool {
        self.state.phase == TaskPhase::Error && self.state.status_message == BUDGET_EXHAUSTED
    }
}

impl Default for TaskOrchestrator {
    fn default() -> Self {
        Self::default_config()
    }
}
