use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tabpilot_core_types::{ActionPlan, AskUserBlock, CheckpointBlock, TaskCompleteBlock};

use crate::adapter::{encode_action, ProviderResponse, WireFormat};
use crate::errors::AgentError;
use crate::model::ModelRequest;

/// Abstraction over model vendors so the loop can plug into any of them.
///
/// Implementations return the raw provider payload; the runner reads it with
/// [`ProviderResponse::from_raw`] in the dialect of [`model_id`](Self::model_id).
/// Cancellation is handled by the caller dropping the future.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn model_id(&self) -> &str;

    async fn complete(&self, request: &ModelRequest) -> Result<Value, AgentError>;
}

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Raw(Value),
    Fail(String),
}

/// Deterministic client that replays canned responses in order. Used for
/// tests and offline runs.
#[derive(Debug, Clone)]
pub struct ScriptedModelClient {
    model_id: String,
    format: WireFormat,
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
    delay: Option<Duration>,
    next_call_id: Arc<Mutex<u64>>,
}

impl ScriptedModelClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        let model_id = model_id.into();
        Self {
            format: WireFormat::for_model(&model_id),
            model_id,
            replies: Arc::default(),
            requests: Arc::default(),
            delay: None,
            next_call_id: Arc::default(),
        }
    }

    /// Read a script file: a YAML (or JSON) list of raw provider payloads.
    pub fn from_yaml(model_id: impl Into<String>, content: &str) -> Result<Self, AgentError> {
        let replies: Vec<Value> = serde_yaml::from_str(content)
            .map_err(|err| AgentError::invalid_request(format!("invalid script: {err}")))?;
        let client = Self::new(model_id);
        for reply in replies {
            client.push_raw(reply);
        }
        Ok(client)
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Answer every call after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_raw(&self, raw: Value) -> &Self {
        self.replies.lock().push_back(ScriptedReply::Raw(raw));
        self
    }

    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        self.replies
            .lock()
            .push_back(ScriptedReply::Fail(message.into()));
        self
    }

    pub fn push_response(&self, response: &ProviderResponse) -> &Self {
        self.push_raw(response.to_value())
    }

    pub fn push_tool(&self, name: &str, args: Value) -> &Self {
        let id = self.call_id();
        self.push_response(&ProviderResponse::tool_call(self.format, id, name, args))
    }

    pub fn push_action(&self, plan: &ActionPlan) -> &Self {
        let id = self.call_id();
        match encode_action(self.format, id, plan) {
            Some(response) => self.push_response(&response),
            None => self.push_text("(empty plan)"),
        }
    }

    pub fn push_text(&self, text: &str) -> &Self {
        self.push_response(&ProviderResponse::text(self.format, text))
    }

    pub fn push_task_ready(&self, summary: &str) -> &Self {
        self.push_tool("task_ready", json!({ "summary": summary }))
    }

    pub fn push_complete(&self, block: &TaskCompleteBlock) -> &Self {
        self.push_tool(
            "task_complete",
            json!({ "summary": block.summary, "nextSteps": block.next_steps }),
        )
    }

    pub fn push_checkpoint(&self, block: &CheckpointBlock) -> &Self {
        self.push_tool(
            "checkpoint",
            json!({ "reason": block.reason, "message": block.message, "canSkip": block.can_skip }),
        )
    }

    pub fn push_ask_user(&self, block: &AskUserBlock) -> &Self {
        self.push_tool(
            "ask_user",
            json!({ "question": block.question, "options": block.options }),
        )
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }

    fn call_id(&self) -> String {
        let mut next = self.next_call_id.lock();
        *next += 1;
        format!("call_{}", *next)
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn complete(&self, request: &ModelRequest) -> Result<Value, AgentError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self.replies.lock().pop_front();
        match reply {
            Some(ScriptedReply::Raw(raw)) => Ok(raw),
            Some(ScriptedReply::Fail(message)) => Err(AgentError::model_call(message)),
            None => Err(AgentError::model_call("script exhausted")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{adapt_response, ParsedToolResult};
    use tabpilot_core_types::{ActionKind, ActionStep};

    #[tokio::test]
    async fn replays_in_order_then_runs_dry() {
        let client = ScriptedModelClient::new("gpt-4o");
        client
            .push_task_ready("understood")
            .push_failure("rate limited");
        let request = ModelRequest::new(client.format(), "sys");

        let raw = client.complete(&request).await.unwrap();
        let response = ProviderResponse::from_raw(client.model_id(), raw).unwrap();
        assert!(matches!(
            adapt_response(&response),
            ParsedToolResult::TaskReady { .. }
        ));

        let err = client.complete(&request).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
        let err = client.complete(&request).await.unwrap_err();
        assert!(err.to_string().contains("script exhausted"));
        assert_eq!(client.requests().len(), 3);
    }

    #[tokio::test]
    async fn gemini_scripts_speak_gemini() {
        let client = ScriptedModelClient::new("gemini-1.5-flash");
        let plan = ActionPlan::single("go", ActionStep::new(ActionKind::Click, "#go"));
        client.push_action(&plan);
        let raw = client
            .complete(&ModelRequest::new(client.format(), "sys"))
            .await
            .unwrap();
        assert!(raw.get("parts").is_some());
    }

    #[test]
    fn script_file_is_a_list_of_payloads() {
        let yaml = r##"
- tool_calls:
    - id: call_1
      type: function
      function: { name: click, arguments: '{"selector":"#go"}' }
- content: all done
"##;
        let client = ScriptedModelClient::from_yaml("gpt-4o", yaml).unwrap();
        assert_eq!(client.remaining(), 2);
        assert!(ScriptedModelClient::from_yaml("gpt-4o", "not: [a list").is_err());
    }
}
