//! Core data types for action primitives

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::ActionError;

/// Execution context for one action
///
/// Carries the deadline and cancellation token every suspension point
/// checks, plus a unique action ID for log correlation.
#[derive(Clone, Debug)]
pub struct ExecCtx {
    /// Deadline for this operation
    pub deadline: Instant,

    /// Cancellation token for cooperative cancellation
    pub cancel_token: CancellationToken,

    /// Unique identifier for this action
    pub action_id: String,
}

impl ExecCtx {
    pub fn new(timeout: Duration, cancel_token: CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancel_token,
            action_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Check if this context has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Check if this context has exceeded its deadline
    pub fn is_timeout(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Get remaining time until deadline
    pub fn remaining_time(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Fail fast when cancelled or past the deadline.
    pub fn ensure_live(&self) -> Result<(), ActionError> {
        if self.is_cancelled() {
            return Err(ActionError::Interrupted("Context cancelled".to_string()));
        }
        if self.is_timeout() {
            return Err(ActionError::Timeout("Context deadline exceeded".to_string()));
        }
        Ok(())
    }

    /// Sleep that ends early with `Interrupted` when the context is cancelled.
    pub async fn pause(&self, duration: Duration) -> Result<(), ActionError> {
        if duration.is_zero() {
            return self.ensure_live();
        }
        tokio::select! {
            _ = self.cancel_token.cancelled() => {
                Err(ActionError::Interrupted("Context cancelled".to_string()))
            }
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

/// One `<option>` of a native select element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
}

/// What the page reports about an element resolved from a selector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementInfo {
    /// Lowercase tag name
    pub tag: String,

    /// `type` attribute for inputs
    pub input_type: Option<String>,

    /// Rendered text content
    pub text: String,

    /// Current form value, if the element has one
    pub value: Option<String>,

    /// Checked state for checkboxes and radios
    pub checked: Option<bool>,

    pub disabled: bool,
    pub visible: bool,

    /// Whether the element is inside the viewport
    pub in_viewport: bool,

    /// Accepts typed text (inputs, textareas, contenteditable)
    pub editable: bool,

    pub alt: Option<String>,
    pub href: Option<String>,

    /// Options of a native select
    pub options: Vec<SelectOption>,

    /// Index into `options` of the current selection
    pub selected_index: Option<usize>,
}

impl ElementInfo {
    /// Checkbox or radio input whose state can be set directly.
    pub fn is_native_toggle(&self) -> bool {
        self.tag == "input"
            && matches!(self.input_type.as_deref(), Some("checkbox") | Some("radio"))
    }

    pub fn is_native_select(&self) -> bool {
        self.tag == "select"
    }

    pub fn selected_text(&self) -> Option<&str> {
        self.selected_index
            .and_then(|idx| self.options.get(idx))
            .map(|opt| opt.text.as_str())
    }
}

/// A visible element that may act as a custom dropdown item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemHandle {
    pub selector: String,
    pub text: String,
}

/// Synthetic DOM events the primitives dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomEvent {
    Focus,
    PointerDown,
    PointerUp,
    Click,
    KeyDown { key: String },
    KeyUp { key: String },
    Input { data: Option<String> },
    Change,
}

/// Page-level scroll directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Top,
    Bottom,
}

impl FromStr for ScrollDirection {
    type Err = ActionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "down" => Ok(ScrollDirection::Down),
            "up" => Ok(ScrollDirection::Up),
            "top" => Ok(ScrollDirection::Top),
            "bottom" => Ok(ScrollDirection::Bottom),
            other => Err(ActionError::InvalidInput(format!(
                "Unknown scroll direction: {other}"
            ))),
        }
    }
}

/// How a wait strategy finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Condition observed within the bound
    Settled,
    /// Bound reached; the action proceeds anyway
    TimedOut,
    /// Fixed delay elapsed
    Delayed,
}
