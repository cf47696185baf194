// In-memory gateway used by tests. Runs move through a scripted list of
// statuses, one per `retrieve_run` call. Each `create_run` hands out a fresh
// run id, and assistant replies are attributed to the run that completed.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::agent_gateway_interface::AgentGateway;
use super::types::{
    AssistantDefinition, MessageContent, MessageRole, MessageText, RequiredAction, Run, RunError,
    RunStatus, SubmitToolOutputs, ThreadMessage, ToolCallRequest, ToolOutput,
};
use crate::error::{Result, ShoppingError};

type ReplyFn = Box<dyn Fn(&[ToolOutput]) -> String + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RecordedMessage {
    pub thread_id: String,
    pub role: MessageRole,
    pub content: String,
    pub run_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub thread_id: String,
    pub run_id: String,
    pub outputs: Vec<ToolOutput>,
}

pub struct ScriptedGateway {
    script: Mutex<VecDeque<Run>>,
    reply: ReplyFn,
    silent: bool,
    threads: Mutex<u32>,
    runs: Mutex<u32>,
    messages: Mutex<Vec<RecordedMessage>>,
    submissions: Mutex<Vec<Submission>>,
    retrievals: Mutex<u32>,
    cancellations: Mutex<Vec<String>>,
    assistants: Mutex<Vec<AssistantDefinition>>,
}

impl ScriptedGateway {
    /// `statuses` are returned by successive `retrieve_run` calls; the last
    /// one repeats once the script runs out
    pub fn new(statuses: Vec<Run>) -> Self {
        Self {
            script: Mutex::new(statuses.into()),
            reply: Box::new(|_| "Happy to help!".to_string()),
            silent: false,
            threads: Mutex::new(0),
            runs: Mutex::new(0),
            messages: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            retrievals: Mutex::new(0),
            cancellations: Mutex::new(Vec::new()),
            assistants: Mutex::new(Vec::new()),
        }
    }

    /// Build the assistant's final reply from every tool output submitted so far
    pub fn with_reply<F>(mut self, reply: F) -> Self
    where
        F: Fn(&[ToolOutput]) -> String + Send + Sync + 'static,
    {
        self.reply = Box::new(reply);
        self
    }

    /// Completed runs post no assistant message
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn run(status: RunStatus) -> Run {
        Run {
            id: "run_1".to_string(),
            thread_id: String::new(),
            status,
            required_action: None,
            last_error: None,
        }
    }

    pub fn requires_action(calls: Vec<ToolCallRequest>) -> Run {
        Run {
            required_action: Some(RequiredAction {
                action_type: "submit_tool_outputs".to_string(),
                submit_tool_outputs: Some(SubmitToolOutputs { tool_calls: calls }),
            }),
            ..Self::run(RunStatus::RequiresAction)
        }
    }

    pub fn failed(message: &str) -> Run {
        Run {
            last_error: Some(RunError {
                code: "server_error".to_string(),
                message: message.to_string(),
            }),
            ..Self::run(RunStatus::Failed)
        }
    }

    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn retrievals(&self) -> u32 {
        *self.retrievals.lock().unwrap()
    }

    /// Run ids passed to `cancel_run`, in call order
    pub fn cancellations(&self) -> Vec<String> {
        self.cancellations.lock().unwrap().clone()
    }

    pub fn assistants(&self) -> Vec<AssistantDefinition> {
        self.assistants.lock().unwrap().clone()
    }

    fn push_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: String,
        run_id: Option<&str>,
    ) {
        self.messages.lock().unwrap().push(RecordedMessage {
            thread_id: thread_id.to_string(),
            role,
            content,
            run_id: run_id.map(String::from),
        });
    }
}

#[async_trait]
impl AgentGateway for ScriptedGateway {
    async fn create_assistant(&self, definition: &AssistantDefinition) -> Result<String> {
        self.assistants.lock().unwrap().push(definition.clone());
        Ok("asst_test".to_string())
    }

    async fn create_thread(&self) -> Result<String> {
        let mut threads = self.threads.lock().unwrap();
        *threads += 1;
        Ok(format!("thread_{}", *threads))
    }

    async fn delete_thread(&self, _thread_id: &str) -> Result<()> {
        Ok(())
    }

    async fn add_message(&self, thread_id: &str, role: MessageRole, content: &str) -> Result<()> {
        self.push_message(thread_id, role, content.to_string(), None);
        Ok(())
    }

    async fn create_run(
        &self,
        thread_id: &str,
        _assistant_id: &str,
        _instructions: Option<&str>,
    ) -> Result<Run> {
        let mut runs = self.runs.lock().unwrap();
        *runs += 1;
        Ok(Run {
            id: format!("run_{}", *runs),
            thread_id: thread_id.to_string(),
            ..Self::run(RunStatus::Queued)
        })
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        *self.retrievals.lock().unwrap() += 1;

        let next = {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            }
        };
        let mut run = next.ok_or_else(|| ShoppingError::Gateway {
            status: 404,
            message: format!("no run {}", run_id),
        })?;
        run.id = run_id.to_string();
        run.thread_id = thread_id.to_string();

        if run.status == RunStatus::Completed && !self.silent {
            let outputs: Vec<ToolOutput> = self
                .submissions()
                .into_iter()
                .flat_map(|s| s.outputs)
                .collect();
            let reply = (self.reply)(&outputs);
            self.push_message(thread_id, MessageRole::Assistant, reply, Some(run_id));
        }
        Ok(run)
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<Run> {
        self.submissions.lock().unwrap().push(Submission {
            thread_id: thread_id.to_string(),
            run_id: run_id.to_string(),
            outputs,
        });
        Ok(Run {
            id: run_id.to_string(),
            thread_id: thread_id.to_string(),
            ..Self::run(RunStatus::Queued)
        })
    }

    async fn cancel_run(&self, _thread_id: &str, run_id: &str) -> Result<()> {
        self.cancellations.lock().unwrap().push(run_id.to_string());
        Ok(())
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>> {
        Ok(self
            .messages()
            .into_iter()
            .rev()
            .filter(|m| m.thread_id == thread_id)
            .enumerate()
            .map(|(i, m)| ThreadMessage {
                id: format!("msg_{}", i),
                role: m.role,
                content: vec![MessageContent::Text {
                    text: MessageText { value: m.content },
                }],
                run_id: m.run_id,
            })
            .collect())
    }
}
