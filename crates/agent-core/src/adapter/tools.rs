//! Tool catalogue advertised to the model.

use serde_json::{json, Value};
use tabpilot_core_types::ActionKind;

use super::WireFormat;

pub(crate) const TASK_COMPLETE: &str = "task_complete";
pub(crate) const CHECKPOINT: &str = "checkpoint";
pub(crate) const ASK_USER: &str = "ask_user";
pub(crate) const TASK_READY: &str = "task_ready";

/// Control tools in declaration order.
pub const CONTROL_TOOLS: [&str; 4] = [TASK_COMPLETE, CHECKPOINT, ASK_USER, TASK_READY];

/// Action tools: one per action kind, named after it.
pub const ACTION_TOOLS: [ActionKind; 11] = ActionKind::ALL;

fn action_description(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Click => "Click an element. Checkboxes and radios are toggled directly.",
        ActionKind::Input => "Type text into an editable element, clearing it first unless clearFirst is false.",
        ActionKind::Select => "Choose an option of a select element or custom dropdown by value or visible text.",
        ActionKind::SelectDate => "Set a date picker to the date in value (YYYY-MM-DD).",
        ActionKind::Scroll => "Scroll the page up/down/top/bottom, or scroll the selected element into view.",
        ActionKind::Extract => "Read the text, value or link of an element without changing the page.",
        ActionKind::Navigate => "Open the http(s) URL given in value.",
        ActionKind::Eval => "Run a script snippet given in value in the page context.",
        ActionKind::Download => "Download the URL in value or the target of the selected link.",
        ActionKind::Tabgroup => "Group, ungroup or name browser tabs as described in value.",
        ActionKind::Native => "Call the native companion with a JSON request in value, e.g. {\"op\":\"clipboard.read\"}.",
    }
}

fn action_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "selector": { "type": "string", "description": "CSS selector of the target element" },
            "value": { "type": "string", "description": "Text, option, URL, date or payload for the action" },
            "clearFirst": { "type": "boolean" },
            "waitFor": { "type": "string", "enum": ["domStable", "networkIdle", "urlChange"] },
            "timeoutMs": { "type": "integer", "minimum": 1 },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "risk": { "type": "string", "enum": ["low", "medium", "high"] },
            "description": { "type": "string", "description": "What the element is, in plain words" },
            "explanation": { "type": "string", "description": "Why this is the next step" }
        },
        "required": ["selector", "risk"]
    })
}

fn control_schema(name: &str) -> (&'static str, Value) {
    match name {
        TASK_COMPLETE => (
            "Report that the goal is achieved.",
            json!({
                "type": "object",
                "properties": {
                    "summary": { "type": "string" },
                    "nextSteps": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["summary"]
            }),
        ),
        CHECKPOINT => (
            "Pause so the user can act or review before continuing.",
            json!({
                "type": "object",
                "properties": {
                    "reason": { "type": "string" },
                    "message": { "type": "string" },
                    "canSkip": { "type": "boolean" }
                },
                "required": ["reason", "message"]
            }),
        ),
        ASK_USER => (
            "Ask the user a clarifying question.",
            json!({
                "type": "object",
                "properties": {
                    "question": { "type": "string" },
                    "options": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["question"]
            }),
        ),
        _ => (
            "Confirm the task is understood and execution can start.",
            json!({
                "type": "object",
                "properties": { "summary": { "type": "string" } },
                "required": ["summary"]
            }),
        ),
    }
}

/// All tools, in the declaration shape of `format`.
pub fn tool_definitions(format: WireFormat) -> Vec<Value> {
    let mut declarations: Vec<(String, String, Value)> = ACTION_TOOLS
        .iter()
        .map(|kind| {
            (
                kind.as_str().to_string(),
                action_description(*kind).to_string(),
                action_parameters(),
            )
        })
        .collect();
    declarations.extend(CONTROL_TOOLS.iter().map(|name| {
        let (description, parameters) = control_schema(name);
        (name.to_string(), description.to_string(), parameters)
    }));

    match format {
        WireFormat::OpenAi => declarations
            .into_iter()
            .map(|(name, description, parameters)| {
                json!({
                    "type": "function",
                    "function": {
                        "name": name,
                        "description": description,
                        "parameters": parameters,
                    }
                })
            })
            .collect(),
        WireFormat::Gemini => {
            let functions: Vec<Value> = declarations
                .into_iter()
                .map(|(name, description, parameters)| {
                    json!({ "name": name, "description": description, "parameters": parameters })
                })
                .collect();
            vec![json!({ "functionDeclarations": functions })]
        }
    }
}
