//! Gemini-style content: inline `functionCall` parts with structured args,
//! optionally preceded by text parts.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ToolInvocation;
use crate::errors::AgentError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeminiPart {
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: GeminiFunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: GeminiFunctionResponse,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiFunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiFunctionResponse {
    pub name: String,
    pub response: Value,
}

impl GeminiContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            role: Some("model".to_string()),
            parts: vec![GeminiPart::Text { text: text.into() }],
        }
    }

    pub fn function_call(name: &str, args: Value) -> Self {
        Self {
            role: Some("model".to_string()),
            parts: vec![GeminiPart::FunctionCall {
                function_call: GeminiFunctionCall {
                    name: name.to_string(),
                    args,
                },
            }],
        }
    }

    /// Text parts joined in order.
    pub fn text_content(&self) -> Option<String> {
        let joined = self
            .parts
            .iter()
            .filter_map(|part| match part {
                GeminiPart::Text { text } => Some(text.trim()),
                _ => None,
            })
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        (!joined.is_empty()).then_some(joined)
    }

    pub(crate) fn first_invocation(&self) -> Result<ToolInvocation, String> {
        let mut preamble = Vec::new();
        for part in &self.parts {
            match part {
                GeminiPart::Text { text } if !text.trim().is_empty() => {
                    preamble.push(text.trim());
                }
                GeminiPart::FunctionCall { function_call } => {
                    let name = function_call.name.trim();
                    if name.is_empty() {
                        return Err("Tool call has no function name".to_string());
                    }
                    // Some gateways forward args as an encoded string.
                    let arguments = match &function_call.args {
                        Value::Null => Value::Object(Default::default()),
                        Value::String(raw) => serde_json::from_str(raw).map_err(|err| {
                            format!("Could not parse arguments for {name}: {err}")
                        })?,
                        other => other.clone(),
                    };
                    return Ok(ToolInvocation {
                        id: name.to_string(),
                        name: name.to_string(),
                        arguments,
                        preamble: (!preamble.is_empty()).then(|| preamble.join("\n")),
                    });
                }
                _ => {}
            }
        }
        Err("Response contained no tool call".to_string())
    }
}

/// Accepts a full `generateContent` body or a bare content object.
pub(crate) fn content_from_raw(raw: Value) -> Result<GeminiContent, AgentError> {
    let content = match raw.get("candidates") {
        Some(candidates) => candidates
            .get(0)
            .and_then(|candidate| candidate.get("content"))
            .cloned()
            .ok_or_else(|| AgentError::adapter("response has no candidates"))?,
        None => raw,
    };
    serde_json::from_value(content).map_err(|err| AgentError::adapter(err.to_string()))
}

pub(crate) fn history_records(invocation: &ToolInvocation, outcome: &str) -> Vec<Value> {
    let mut call_parts = Vec::new();
    if let Some(text) = &invocation.preamble {
        call_parts.push(json!({ "text": text }));
    }
    call_parts.push(json!({
        "functionCall": { "name": invocation.name, "args": invocation.arguments }
    }));
    vec![
        json!({ "role": "model", "parts": call_parts }),
        json!({
            "role": "user",
            "parts": [{
                "functionResponse": {
                    "name": invocation.name,
                    "response": { "result": outcome },
                }
            }],
        }),
    ]
}
