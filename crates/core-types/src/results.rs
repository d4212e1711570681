//! Execution outcomes and loop history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::{ActionKind, ActionPlan, ActionStep};

/// Outcome of executing exactly one [`ActionStep`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub action: ActionKind,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn success(step: &ActionStep, duration_ms: u64) -> Self {
        Self {
            success: true,
            action: step.action,
            selector: step.selector.clone(),
            extracted_data: None,
            error: None,
            duration_ms,
        }
    }

    pub fn failure(step: &ActionStep, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            action: step.action,
            selector: step.selector.clone(),
            extracted_data: None,
            error: Some(error.into()),
            duration_ms,
        }
    }

    pub fn with_extracted(mut self, data: impl Into<String>) -> Self {
        self.extracted_data = Some(data.into());
        self
    }

    /// One-line outcome used by history digests.
    pub fn outcome_line(&self) -> String {
        match (&self.error, &self.extracted_data) {
            (Some(err), _) if !self.success => format!("failed: {err}"),
            (_, Some(data)) => format!("ok ({}ms) -> {}", self.duration_ms, truncate(data, 120)),
            _ => format!("ok ({}ms)", self.duration_ms),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}…")
    }
}

/// Multi-step form progress observed on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowState {
    /// Number of form fields currently holding a value.
    #[serde(default)]
    pub filled_fields: u32,
    #[serde(default)]
    pub total_fields: u32,
    /// Active step indicator label ("Step 2 of 4", "Shipping", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_label: Option<String>,
}

/// One completed loop iteration. History is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopEntry {
    pub iteration: u32,
    pub page_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowState>,
    pub plan: ActionPlan,
    #[serde(default)]
    pub results: Vec<ExecutionResult>,
    pub timestamp: DateTime<Utc>,
}

impl LoopEntry {
    pub fn new(
        iteration: u32,
        page_url: impl Into<String>,
        plan: ActionPlan,
        results: Vec<ExecutionResult>,
    ) -> Self {
        Self {
            iteration,
            page_url: page_url.into(),
            flow: None,
            plan,
            results,
            timestamp: Utc::now(),
        }
    }

    pub fn with_flow(mut self, flow: FlowState) -> Self {
        self.flow = Some(flow);
        self
    }

    pub fn has_failure(&self) -> bool {
        self.results.iter().any(|r| !r.success)
    }

    pub fn filled_fields(&self) -> Option<u32> {
        self.flow.as_ref().map(|f| f.filled_fields)
    }

    pub fn step_label(&self) -> Option<&str> {
        self.flow.as_ref().and_then(|f| f.step_label.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_outcome_line_carries_error() {
        let step = ActionStep::new(ActionKind::Click, "#missing");
        let result = ExecutionResult::failure(&step, "Element not found: #missing", 12);
        assert!(!result.success);
        assert_eq!(result.outcome_line(), "failed: Element not found: #missing");
    }

    #[test]
    fn extracted_data_is_truncated_in_digest() {
        let step = ActionStep::new(ActionKind::Extract, "p");
        let long = "x".repeat(300);
        let result = ExecutionResult::success(&step, 4).with_extracted(long);
        let line = result.outcome_line();
        assert!(line.starts_with("ok (4ms) -> "));
        assert!(line.ends_with('…'));
    }

    #[test]
    fn loop_entry_detects_failures() {
        let step = ActionStep::new(ActionKind::Click, "#a");
        let entry = LoopEntry::new(
            1,
            "https://example.test",
            ActionPlan::single("click a", step.clone()),
            vec![
                ExecutionResult::success(&step, 1),
                ExecutionResult::failure(&step, "boom", 1),
            ],
        );
        assert!(entry.has_failure());
        assert_eq!(entry.filled_fields(), None);
    }
}
