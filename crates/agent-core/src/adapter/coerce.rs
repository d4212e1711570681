//! Defensive coercion of tool arguments into canonical types.
//!
//! Models are sloppy: numbers arrive as strings, booleans as `"true"`,
//! field names in either camelCase or snake_case. Anything that cannot be
//! read sensibly falls back to a default or is left absent.

use serde_json::{json, Map, Value};
use tabpilot_core_types::{
    clamp_confidence, ActionKind, ActionPlan, ActionStep, AskUserBlock, CheckpointBlock,
    RiskLevel, TaskCompleteBlock, WaitFor, DEFAULT_CONFIDENCE,
};

use super::{ParsedToolResult, ToolInvocation};
use crate::adapter::tools::{ASK_USER, CHECKPOINT, TASK_COMPLETE, TASK_READY};

pub(super) fn interpret(invocation: &ToolInvocation) -> ParsedToolResult {
    let Some(args) = invocation.arguments.as_object() else {
        return ParsedToolResult::error(format!(
            "Arguments for {} must be a JSON object",
            invocation.name
        ));
    };

    match invocation.name.as_str() {
        TASK_COMPLETE => ParsedToolResult::Complete {
            block: TaskCompleteBlock {
                summary: text(args, &["summary", "message"]).unwrap_or_default(),
                next_steps: string_list(args, &["nextSteps", "next_steps"]),
            },
        },
        CHECKPOINT => ParsedToolResult::Checkpoint {
            block: CheckpointBlock {
                reason: text(args, &["reason"]).unwrap_or_else(|| "checkpoint".to_string()),
                message: text(args, &["message", "description"]).unwrap_or_default(),
                can_skip: flag(args, &["canSkip", "can_skip"]).unwrap_or(false),
            },
        },
        ASK_USER => match text(args, &["question"]) {
            Some(question) => ParsedToolResult::AskUser {
                block: AskUserBlock {
                    question,
                    options: string_list(args, &["options", "choices"]),
                },
            },
            None => ParsedToolResult::error("ask_user requires a question"),
        },
        TASK_READY => ParsedToolResult::TaskReady {
            summary: text(args, &["summary", "goal"]).unwrap_or_default(),
        },
        name => match name.parse::<ActionKind>() {
            Ok(kind) => {
                let step = action_step(kind, args);
                let explanation = text(args, &["explanation", "reasoning"])
                    .or_else(|| invocation.preamble.clone())
                    .unwrap_or_else(|| step.label());
                ParsedToolResult::Action {
                    plan: ActionPlan::single(explanation, step),
                }
            }
            Err(_) => ParsedToolResult::error(format!("Unknown action: {name}")),
        },
    }
}

fn action_step(kind: ActionKind, args: &Map<String, Value>) -> ActionStep {
    let mut step = ActionStep::new(kind, text(args, &["selector"]).unwrap_or_default());
    step.value = text(args, &["value", "text", "url"]);
    step.clear_first = flag(args, &["clearFirst", "clear_first"]);
    step.wait_for = text(args, &["waitFor", "wait_for"]).and_then(|raw| raw.parse::<WaitFor>().ok());
    step.timeout_ms = number(args, &["timeoutMs", "timeout_ms"])
        .filter(|ms| ms.is_finite() && *ms > 0.0)
        .map(|ms| ms as u64);
    step.confidence = number(args, &["confidence"])
        .map(clamp_confidence)
        .unwrap_or(DEFAULT_CONFIDENCE);
    step.risk = text(args, &["risk"])
        .map(|raw| RiskLevel::parse_lenient(&raw))
        .unwrap_or_default();
    step.description = text(args, &["description"]);
    step
}

/// Arguments object for an action tool call, the inverse of [`interpret`].
pub(super) fn action_arguments(step: &ActionStep, explanation: &str) -> Value {
    let mut args = json!({
        "selector": step.selector,
        "confidence": step.confidence,
        "risk": step.risk.as_str(),
    });
    if let Some(obj) = args.as_object_mut() {
        if !explanation.is_empty() {
            obj.insert("explanation".into(), json!(explanation));
        }
        if let Some(value) = &step.value {
            obj.insert("value".into(), json!(value));
        }
        if let Some(clear_first) = step.clear_first {
            obj.insert("clearFirst".into(), json!(clear_first));
        }
        if let Some(wait_for) = step.wait_for {
            obj.insert("waitFor".into(), json!(wait_for.as_str()));
        }
        if let Some(timeout_ms) = step.timeout_ms {
            obj.insert("timeoutMs".into(), json!(timeout_ms));
        }
        if let Some(description) = &step.description {
            obj.insert("description".into(), json!(description));
        }
    }
    args
}

fn field<'a>(args: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| args.get(*key))
        .find(|value| !value.is_null())
}

/// Strings, numbers and booleans all read as text; blank text is absent.
fn text(args: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    let raw = match field(args, keys)? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!raw.trim().is_empty()).then_some(raw)
}

fn flag(args: &Map<String, Value>, keys: &[&str]) -> Option<bool> {
    match field(args, keys)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

fn number(args: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    match field(args, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_list(args: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    match field(args, keys) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoke(name: &str, arguments: Value) -> ParsedToolResult {
        interpret(&ToolInvocation {
            id: "call".into(),
            name: name.into(),
            arguments,
            preamble: None,
        })
    }

    #[test]
    fn sloppy_action_arguments_are_coerced() {
        let result = invoke(
            "input",
            json!({
                "selector": "#email",
                "value": 42,
                "clear_first": "false",
                "waitFor": "networkIdle",
                "timeoutMs": "1500",
                "confidence": 3.5,
                "risk": "catastrophic",
                "extra": { "ignored": true }
            }),
        );
        let step = result.first_step().unwrap().clone();
        assert_eq!(step.action, ActionKind::Input);
        assert_eq!(step.value.as_deref(), Some("42"));
        assert_eq!(step.clear_first, Some(false));
        assert_eq!(step.wait_for, Some(WaitFor::NetworkIdle));
        assert_eq!(step.timeout_ms, Some(1500));
        assert_eq!(step.confidence, 1.0);
        assert_eq!(step.risk, RiskLevel::Low);
    }

    #[test]
    fn missing_optionals_stay_absent() {
        let step = invoke("click", json!({ "selector": "#go" }))
            .first_step()
            .unwrap()
            .clone();
        assert_eq!(step.confidence, DEFAULT_CONFIDENCE);
        assert!(step.value.is_none());
        assert!(step.wait_for.is_none());
        assert!(step.timeout_ms.is_none());
        assert!(step.description.is_none());
    }

    #[test]
    fn unknown_wait_strategy_is_dropped() {
        let step = invoke("click", json!({ "selector": "#go", "waitFor": "forever" }))
            .first_step()
            .unwrap()
            .clone();
        assert!(step.wait_for.is_none());
    }

    #[test]
    fn control_tools_become_blocks() {
        match invoke(
            "task_complete",
            json!({ "summary": "Booked", "nextSteps": ["Check email", 7] }),
        ) {
            ParsedToolResult::Complete { block } => {
                assert_eq!(block.summary, "Booked");
                assert_eq!(block.next_steps, vec!["Check email", "7"]);
            }
            other => panic!("unexpected {other:?}"),
        }

        match invoke(
            "checkpoint",
            json!({ "reason": "captcha", "message": "Solve it", "canSkip": true }),
        ) {
            ParsedToolResult::Checkpoint { block } => {
                assert_eq!(block.reason, "captcha");
                assert!(block.can_skip);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(invoke("ask_user", json!({ "options": ["a"] })).is_error());
    }

    #[test]
    fn unknown_tool_names_the_action() {
        assert_eq!(
            invoke("hover", json!({})),
            ParsedToolResult::error("Unknown action: hover")
        );
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        assert!(invoke("click", json!(["#go"])).is_error());
    }
}
