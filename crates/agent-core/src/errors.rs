use thiserror::Error;

use crate::agent_loop::TaskPhase;

/// Errors emitted by the agent-core crate.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Raised when an operation is not allowed from the current phase.
    #[error("cannot {op} while task is {phase}")]
    InvalidTransition { op: &'static str, phase: TaskPhase },

    /// Raised when a request is malformed or missing required fields.
    #[error("invalid agent request: {0}")]
    InvalidRequest(String),

    /// Raised when the model collaborator fails or returns nothing usable.
    #[error("model call failed: {0}")]
    ModelCall(String),

    /// Raised when the model collaborator does not answer in time.
    #[error("model call timed out after {0}ms")]
    ModelTimeout(u64),

    /// Raised when the task was aborted while an operation was in flight.
    #[error("operation cancelled")]
    Cancelled,

    /// Raised when a raw provider payload cannot be read as a response.
    #[error("unreadable provider response: {0}")]
    Adapter(String),
}

impl AgentError {
    /// Helper for wrapping static string errors.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn model_call(message: impl Into<String>) -> Self {
        Self::ModelCall(message.into())
    }

    pub fn adapter(message: impl Into<String>) -> Self {
        Self::Adapter(message.into())
    }

    pub(crate) fn transition(op: &'static str, phase: TaskPhase) -> Self {
        Self::InvalidTransition { op, phase }
    }
}
