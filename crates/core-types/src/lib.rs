//! Shared primitives for the TabPilot agent loop.
//!
//! Every crate in the workspace speaks in terms of these types: the response
//! adapter produces [`ActionStep`]s, the policy engine judges them, the
//! execution engine turns them into [`ExecutionResult`]s and the orchestrator
//! files everything into [`LoopEntry`] history.

mod action;
mod control;
mod ids;
mod results;

pub use action::{
    clamp_confidence, ActionKind, ActionPlan, ActionStep, RiskLevel, WaitFor, DEFAULT_CONFIDENCE,
};
pub use control::{AskUserBlock, CheckpointBlock, TaskCompleteBlock};
pub use ids::{TabId, TaskId};
pub use results::{ExecutionResult, FlowState, LoopEntry};

use thiserror::Error;

/// Raised when a textual value does not name a known variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
