use async_trait::async_trait;

use super::types::{AssistantDefinition, MessageRole, Run, ThreadMessage, ToolOutput};
use crate::error::Result;

/// Interface for the remote assistant service.
/// The service owns conversation state: threads hold messages, runs execute
/// the assistant over a thread and may pause for local tool calls.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    /// Declare the assistant and return its identifier
    async fn create_assistant(&self, definition: &AssistantDefinition) -> Result<String>;

    /// Create an empty thread and return its identifier
    async fn create_thread(&self) -> Result<String>;

    async fn delete_thread(&self, thread_id: &str) -> Result<()>;

    async fn add_message(&self, thread_id: &str, role: MessageRole, content: &str) -> Result<()>;

    /// Start a run of `assistant_id` against the thread
    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        instructions: Option<&str>,
    ) -> Result<Run>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    /// Resume a paused run. `outputs` must hold exactly one entry per pending call.
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<Run>;

    /// Stop a run that is still active so the thread accepts new messages
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<()>;

    /// Messages on the thread, newest first
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>>;
}
