//! Agent loop (observe → think → act) for a single live tab.
//!
//! Each iteration captures the page, asks the model for exactly one tool
//! call, runs the resulting action through policy and the execution engine,
//! and records what happened. The loop stops when the model completes the
//! task, needs the user, or the budget runs out.
//!
//! # Key Components
//!
//! - [`TaskOrchestrator`]: task phases, loop budget and history
//! - [`OrchestratorConfig`]: budget heuristics and loop pacing
//! - [`StateFormatter`]: page snapshot rendered for the model
//! - [`PromptAssembler`]: system prompt and per-iteration user message
//! - [`AgentRunner`]: drives the loop against its collaborators

pub mod config;
pub mod digest;
pub mod orchestrator;
pub mod prompt;
pub mod runner;
pub mod state_formatter;
pub mod types;

pub use config::{LoopBudget, OrchestratorConfig};
pub use digest::{is_stuck, summarize_history};
pub use orchestrator::{Clarification, TaskOrchestrator, TaskPhase, TaskState, BUDGET_EXHAUSTED};
pub use prompt::{DefaultPromptAssembler, PromptAssembler, PromptContext, AGENT_LOOP_SYSTEM_PROMPT};
pub use runner::{AbortHandle, AgentRunner, RunPause, DECLINED_BY_USER};
pub use state_formatter::StateFormatter;
pub use types::{ElementSummary, PageSnapshot};
