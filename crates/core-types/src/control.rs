//! Control signals emitted by the model instead of a page action.

use serde::{Deserialize, Serialize};

/// Deliberate pause requiring a human decision before the loop continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointBlock {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub can_skip: bool,
}

impl CheckpointBlock {
    pub fn new(reason: impl Into<String>, message: impl Into<String>, can_skip: bool) -> Self {
        Self {
            reason: reason.into(),
            message: message.into(),
            can_skip,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompleteBlock {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

impl TaskCompleteBlock {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            next_steps: Vec::new(),
        }
    }
}

/// Question the model needs answered before it can continue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskUserBlock {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
}

impl AskUserBlock {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            options: Vec::new(),
        }
    }
}
