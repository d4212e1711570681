//! OpenAI-style chat messages: `tool_calls[].function.arguments` is a JSON string.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ToolInvocation;
use crate::errors::AgentError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: OpenAiFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

impl OpenAiMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            tool_calls: None,
        }
    }

    pub fn tool_call(id: impl Into<String>, name: &str, args: &Value) -> Self {
        Self {
            content: None,
            tool_calls: Some(vec![OpenAiToolCall {
                id: id.into(),
                kind: function_kind(),
                function: OpenAiFunction {
                    name: name.to_string(),
                    arguments: args.to_string(),
                },
            }]),
        }
    }

    pub fn text_content(&self) -> Option<String> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }

    pub(crate) fn first_invocation(&self) -> Result<ToolInvocation, String> {
        let call = self
            .tool_calls
            .as_deref()
            .and_then(<[OpenAiToolCall]>::first)
            .ok_or_else(|| "Response contained no tool call".to_string())?;

        let name = call.function.name.trim();
        if name.is_empty() {
            return Err("Tool call has no function name".to_string());
        }

        let raw = call.function.arguments.trim();
        let arguments = if raw.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(raw)
                .map_err(|err| format!("Could not parse arguments for {name}: {err}"))?
        };

        Ok(ToolInvocation {
            id: call.id.clone(),
            name: name.to_string(),
            arguments,
            preamble: self.text_content(),
        })
    }
}

/// Accepts a full completion body or a bare assistant message.
pub(crate) fn message_from_raw(raw: Value) -> Result<OpenAiMessage, AgentError> {
    let message = match raw.get("choices") {
        Some(choices) => choices
            .get(0)
            .and_then(|choice| choice.get("message"))
            .cloned()
            .ok_or_else(|| AgentError::adapter("completion has no choices"))?,
        None => raw,
    };
    serde_json::from_value(message).map_err(|err| AgentError::adapter(err.to_string()))
}

pub(crate) fn history_records(invocation: &ToolInvocation, outcome: &str) -> Vec<Value> {
    vec![
        json!({
            "role": "assistant",
            "content": invocation.preamble,
            "tool_calls": [{
                "id": invocation.id,
                "type": "function",
                "function": {
                    "name": invocation.name,
                    "arguments": invocation.arguments.to_string(),
                },
            }],
        }),
        json!({
            "role": "tool",
            "tool_call_id": invocation.id,
            "content": outcome,
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_full_completion_body() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "click", "arguments": "{\"selector\":\"#go\"}" }
                    }]
                }
            }]
        });
        let message = message_from_raw(raw).unwrap();
        let invocation = message.first_invocation().unwrap();
        assert_eq!(invocation.id, "call_1");
        assert_eq!(invocation.name, "click");
        assert_eq!(invocation.arguments["selector"], "#go");
        assert!(invocation.preamble.is_none());
    }

    #[test]
    fn null_tool_calls_means_no_invocation() {
        let message: OpenAiMessage =
            serde_json::from_value(json!({ "content": "hello", "tool_calls": null })).unwrap();
        assert_eq!(
            message.first_invocation().unwrap_err(),
            "Response contained no tool call"
        );
    }

    #[test]
    fn garbage_arguments_are_reported() {
        let message = OpenAiMessage {
            content: None,
            tool_calls: Some(vec![OpenAiToolCall {
                id: "call_2".into(),
                kind: function_kind(),
                function: OpenAiFunction {
                    name: "input".into(),
                    arguments: "{selector: oops".into(),
                },
            }]),
        };
        let err = message.first_invocation().unwrap_err();
        assert!(err.starts_with("Could not parse arguments for input"));
    }

    #[test]
    fn history_pairs_call_with_tool_result() {
        let message = OpenAiMessage::tool_call("call_9", "scroll", &json!({ "value": "down" }));
        let invocation = message.first_invocation().unwrap();
        let records = history_records(&invocation, "ok (12ms)");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["tool_calls"][0]["id"], "call_9");
        assert_eq!(records[1]["role"], "tool");
        assert_eq!(records[1]["tool_call_id"], "call_9");
        assert_eq!(records[1]["content"], "ok (12ms)");
    }
}
