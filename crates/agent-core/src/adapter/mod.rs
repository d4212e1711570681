//! Response adapter.
//!
//! Providers answer in one of two incompatible tool-call shapes. OpenAI-style
//! messages carry `tool_calls` whose arguments are a JSON-encoded string;
//! Gemini-style content carries inline `functionCall` parts with structured
//! args, optionally preceded by free text. Both are folded into one
//! [`ParsedToolResult`] so nothing past this module ever branches on vendor.
//!
//! The adapter never fails: unparseable arguments, an empty tool list and
//! unknown tool names all come back as [`ParsedToolResult::Error`].

mod coerce;
mod gemini;
mod openai;
mod tools;

pub use gemini::{GeminiContent, GeminiFunctionCall, GeminiFunctionResponse, GeminiPart};
pub use openai::{OpenAiFunction, OpenAiMessage, OpenAiToolCall};
pub use tools::{tool_definitions, ACTION_TOOLS, CONTROL_TOOLS};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabpilot_core_types::{
    ActionPlan, ActionStep, AskUserBlock, CheckpointBlock, TaskCompleteBlock,
};
use tracing::debug;

use crate::errors::AgentError;

/// Wire dialect spoken by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    OpenAi,
    Gemini,
}

impl WireFormat {
    /// Picks the dialect from a model id. Anything that is not a Gemini model
    /// speaks the OpenAI shape.
    pub fn for_model(model_id: &str) -> Self {
        let id = model_id.trim().to_ascii_lowercase();
        let bare = id.rsplit('/').next().unwrap_or(&id);
        if bare.starts_with("gemini") {
            WireFormat::Gemini
        } else {
            WireFormat::OpenAi
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WireFormat::OpenAi => "openai",
            WireFormat::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provider response, discriminated by wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum ProviderResponse {
    OpenAi(OpenAiMessage),
    Gemini(GeminiContent),
}

impl ProviderResponse {
    pub fn format(&self) -> WireFormat {
        match self {
            ProviderResponse::OpenAi(_) => WireFormat::OpenAi,
            ProviderResponse::Gemini(_) => WireFormat::Gemini,
        }
    }

    /// Reads a raw payload in the dialect of `model_id`.
    ///
    /// Accepts either the full completion body (`choices` / `candidates`) or
    /// just the assistant message / content inside it.
    pub fn from_raw(model_id: &str, raw: Value) -> Result<Self, AgentError> {
        Self::from_raw_as(WireFormat::for_model(model_id), raw)
    }

    pub fn from_raw_as(format: WireFormat, raw: Value) -> Result<Self, AgentError> {
        match format {
            WireFormat::OpenAi => openai::message_from_raw(raw).map(ProviderResponse::OpenAi),
            WireFormat::Gemini => gemini::content_from_raw(raw).map(ProviderResponse::Gemini),
        }
    }

    /// Builds a single-tool-call response. Used by scripted clients and when
    /// re-encoding a canonical action for a provider.
    pub fn tool_call(format: WireFormat, id: impl Into<String>, name: &str, args: Value) -> Self {
        match format {
            WireFormat::OpenAi => {
                ProviderResponse::OpenAi(OpenAiMessage::tool_call(id, name, &args))
            }
            WireFormat::Gemini => {
                ProviderResponse::Gemini(GeminiContent::function_call(name, args))
            }
        }
    }

    /// A text-only answer with no tool call.
    pub fn text(format: WireFormat, text: impl Into<String>) -> Self {
        match format {
            WireFormat::OpenAi => ProviderResponse::OpenAi(OpenAiMessage::text(text)),
            WireFormat::Gemini => ProviderResponse::Gemini(GeminiContent::text(text)),
        }
    }

    /// Free text the model produced alongside (or instead of) a tool call.
    pub fn text_content(&self) -> Option<String> {
        match self {
            ProviderResponse::OpenAi(message) => message.text_content(),
            ProviderResponse::Gemini(content) => content.text_content(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ProviderResponse::OpenAi(message) => serde_json::to_value(message),
            ProviderResponse::Gemini(content) => serde_json::to_value(content),
        }
        .unwrap_or(Value::Null)
    }
}

/// First tool invocation in a response, with arguments already decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    /// Text the model wrote before the call.
    pub preamble: Option<String>,
}

/// Canonical outcome of one model turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParsedToolResult {
    Action { plan: ActionPlan },
    Checkpoint { block: CheckpointBlock },
    Complete { block: TaskCompleteBlock },
    AskUser { block: AskUserBlock },
    TaskReady { summary: String },
    Error { error: String },
}

impl ParsedToolResult {
    pub fn error(message: impl Into<String>) -> Self {
        ParsedToolResult::Error {
            error: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ParsedToolResult::Action { .. } => "action",
            ParsedToolResult::Checkpoint { .. } => "checkpoint",
            ParsedToolResult::Complete { .. } => "complete",
            ParsedToolResult::AskUser { .. } => "ask_user",
            ParsedToolResult::TaskReady { .. } => "task_ready",
            ParsedToolResult::Error { .. } => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ParsedToolResult::Error { .. })
    }

    /// The single action step, when this is an action result.
    pub fn first_step(&self) -> Option<&ActionStep> {
        match self {
            ParsedToolResult::Action { plan } => plan.actions.first(),
            _ => None,
        }
    }
}

/// Locates the first tool invocation. Later invocations are ignored.
pub fn first_invocation(response: &ProviderResponse) -> Result<ToolInvocation, String> {
    match response {
        ProviderResponse::OpenAi(message) => message.first_invocation(),
        ProviderResponse::Gemini(content) => content.first_invocation(),
    }
}

/// Normalizes a provider response into one canonical result.
pub fn adapt_response(response: &ProviderResponse) -> ParsedToolResult {
    let invocation = match first_invocation(response) {
        Ok(invocation) => invocation,
        Err(error) => {
            debug!(format = %response.format(), error = %error, "No usable tool call");
            return ParsedToolResult::Error { error };
        }
    };
    debug!(
        format = %response.format(),
        tool = %invocation.name,
        "Adapting tool call"
    );
    coerce::interpret(&invocation)
}

/// Re-encodes a canonical action step as a provider tool call.
pub fn encode_action(
    format: WireFormat,
    id: impl Into<String>,
    plan: &ActionPlan,
) -> Option<ProviderResponse> {
    let step = plan.actions.first()?;
    let args = coerce::action_arguments(step, &plan.explanation);
    Some(ProviderResponse::tool_call(format, id, step.action.as_str(), args))
}

/// Paired history records for the call in `response` and its outcome:
/// the assistant message carrying the tool call, then the tool result.
///
/// Returns an empty list when the response holds no tool call.
pub fn tool_history_records(response: &ProviderResponse, outcome: &str) -> Vec<Value> {
    let Ok(invocation) = first_invocation(response) else {
        return Vec::new();
    };
    match response {
        ProviderResponse::OpenAi(_) => openai::history_records(&invocation, outcome),
        ProviderResponse::Gemini(_) => gemini::history_records(&invocation, outcome),
    }
}

/// A plain user turn in the given dialect.
pub fn user_message(format: WireFormat, text: &str) -> Value {
    match format {
        WireFormat::OpenAi => serde_json::json!({ "role": "user", "content": text }),
        WireFormat::Gemini => serde_json::json!({ "role": "user", "parts": [{ "text": text }] }),
    }
}
