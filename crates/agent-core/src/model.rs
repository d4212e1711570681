use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapter::{tool_definitions, user_message, WireFormat};

/// One call to the model collaborator.
///
/// `messages` are already in the wire shape of `format`, so a client only
/// has to wrap them in its transport envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub format: WireFormat,
    pub system_prompt: String,
    pub messages: Vec<Value>,
    pub tools: Vec<Value>,
}

impl ModelRequest {
    pub fn new(format: WireFormat, system_prompt: impl Into<String>) -> Self {
        Self {
            format,
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
            tools: tool_definitions(format),
        }
    }

    pub fn with_messages(mut self, messages: impl IntoIterator<Item = Value>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Append a user turn.
    pub fn with_user(mut self, text: &str) -> Self {
        self.messages.push(user_message(self.format, text));
        self
    }

    /// Text of the last user turn, whichever dialect it is in.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.get("role").and_then(Value::as_str) == Some("user"))
            .find_map(|m| {
                m.get("content").and_then(Value::as_str).or_else(|| {
                    m.get("parts")
                        .and_then(|parts| parts.get(0))
                        .and_then(|part| part.get("text"))
                        .and_then(Value::as_str)
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_tools_for_its_dialect() {
        let request = ModelRequest::new(WireFormat::Gemini, "sys").with_user("hello");
        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.last_user_text(), Some("hello"));

        let request = ModelRequest::new(WireFormat::OpenAi, "sys").with_user("hi");
        assert!(request.tools.len() > 1);
        assert_eq!(request.last_user_text(), Some("hi"));
    }
}
