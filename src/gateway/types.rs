use serde::{Deserialize, Serialize};

/// Lifecycle status of a remote run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    /// Any status string this client does not know about
    Unknown,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
            RunStatus::Unknown => "unknown",
        }
    }

    /// Terminal states that will never reach `completed`
    pub fn is_unsuccessful_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Cancelled | RunStatus::Failed | RunStatus::Incomplete | RunStatus::Expired
        )
    }
}

impl From<String> for RunStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "requires_action" => RunStatus::RequiresAction,
            "cancelling" => RunStatus::Cancelling,
            "cancelled" => RunStatus::Cancelled,
            "failed" => RunStatus::Failed,
            "completed" => RunStatus::Completed,
            "incomplete" => RunStatus::Incomplete,
            "expired" => RunStatus::Expired,
            _ => RunStatus::Unknown,
        }
    }
}

impl From<RunStatus> for String {
    fn from(value: RunStatus) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote execution of the assistant over a thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_action: Option<RequiredAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<RunError>,
}

impl Run {
    /// Tool calls the run is waiting on, empty unless `requires_action`
    pub fn pending_tool_calls(&self) -> &[ToolCallRequest] {
        match &self.required_action {
            Some(RequiredAction {
                submit_tool_outputs: Some(submit),
                ..
            }) => &submit.tool_calls,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredAction {
    #[serde(rename = "type", default = "default_required_action_type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_tool_outputs: Option<SubmitToolOutputs>,
}

fn default_required_action_type() -> String {
    "submit_tool_outputs".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitToolOutputs {
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// A request from the remote agent to run a local tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "type", default = "default_function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object
    #[serde(default)]
    pub arguments: String,
}

fn default_function_type() -> String {
    "function".to_string()
}

impl ToolCallRequest {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            call_type: default_function_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.to_string(),
            },
        }
    }
}

/// Result of one tool call, sent back to resume the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A message stored on a remote thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    #[serde(default)]
    pub id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub content: Vec<MessageContent>,
    /// Run that authored the message; absent for messages added directly
    #[serde(default)]
    pub run_id: Option<String>,
}

impl ThreadMessage {
    /// Concatenated text parts, other content kinds are skipped
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                MessageContent::Text { text } => Some(text.value.as_str()),
                MessageContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: MessageText },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageText {
    pub value: String,
}

/// Static declaration of the assistant created once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantDefinition {
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_with_required_action_parses() {
        let run: Run = serde_json::from_value(json!({
            "id": "run_1",
            "object": "thread.run",
            "thread_id": "thread_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "search_google_shopping",
                            "arguments": "{\"query\":\"running shoes\"}"
                        }
                    }]
                }
            }
        }))
        .unwrap();

        assert_eq!(run.status, RunStatus::RequiresAction);
        let calls = run.pending_tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].function.name, "search_google_shopping");
    }

    #[test]
    fn test_unknown_status_does_not_fail_parsing() {
        let run: Run = serde_json::from_value(json!({"id": "run_1", "status": "paused_for_review"})).unwrap();
        assert_eq!(run.status, RunStatus::Unknown);
        assert!(run.pending_tool_calls().is_empty());
    }

    #[test]
    fn test_terminal_statuses() {
        for status in ["failed", "cancelled", "expired", "incomplete"] {
            assert!(RunStatus::from(status.to_string()).is_unsuccessful_terminal());
        }
        for status in ["queued", "in_progress", "requires_action", "completed", "cancelling"] {
            assert!(!RunStatus::from(status.to_string()).is_unsuccessful_terminal());
        }
    }

    #[test]
    fn test_message_text_skips_non_text_parts() {
        let message: ThreadMessage = serde_json::from_value(json!({
            "id": "msg_1",
            "role": "assistant",
            "content": [
                {"type": "image_file", "image_file": {"file_id": "file_1"}},
                {"type": "text", "text": {"value": "Here you go", "annotations": []}}
            ]
        }))
        .unwrap();
        assert_eq!(message.text(), "Here you go");
    }
}
