use std::sync::Arc;

use tracing::{debug, info, warn};

use super::run_poller::{PollPolicy, PollStep, RunPoller};
use super::session::Session;
use crate::error::{Result, ShoppingError};
use crate::gateway::{AgentGateway, MessageRole, Run};
use crate::tools::ToolExecutor;

/// Drives one user turn against the remote assistant: post the message,
/// start a run, poll it, service tool calls, and return the reply
pub struct ConversationLoop {
    gateway: Arc<dyn AgentGateway>,
    executor: ToolExecutor,
    assistant_id: String,
    run_instructions: String,
    policy: PollPolicy,
}

impl ConversationLoop {
    pub fn new(
        gateway: Arc<dyn AgentGateway>,
        executor: ToolExecutor,
        assistant_id: String,
        run_instructions: String,
        policy: PollPolicy,
    ) -> Self {
        Self {
            gateway,
            executor,
            assistant_id,
            run_instructions,
            policy,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn AgentGateway> {
        &self.gateway
    }

    /// Process one user message and return the assistant's reply verbatim
    pub async fn process_query(&self, session: &Session, user_text: &str) -> Result<String> {
        let _turn = session.begin_turn().await;
        let thread_id = session.thread_id.as_str();
        info!("Processing query for session {}", session.session_id);

        self.gateway
            .add_message(thread_id, MessageRole::User, user_text)
            .await?;

        let instructions = Some(self.run_instructions.as_str()).filter(|s| !s.is_empty());
        let run = self
            .gateway
            .create_run(thread_id, &self.assistant_id, instructions)
            .await?;
        let run_id = run.id.clone();

        let run = match self.drive_run(thread_id, run).await {
            Ok(run) => run,
            Err(e) => {
                self.abandon_run(thread_id, &run_id, &e).await;
                return Err(e);
            }
        };

        let reply = self
            .gateway
            .list_messages(thread_id)
            .await?
            .into_iter()
            .find(|m| {
                m.role == MessageRole::Assistant && m.run_id.as_deref() == Some(run.id.as_str())
            })
            .map(|m| m.text())
            .ok_or_else(|| ShoppingError::NoAssistantReply(thread_id.to_string()))?;

        session.record_turn(user_text, &reply).await;
        Ok(reply)
    }

    /// Poll the run and service its tool calls until it completes
    async fn drive_run(&self, thread_id: &str, mut run: Run) -> Result<Run> {
        let mut poller = RunPoller::new(self.policy.clone(), run.id.clone());

        loop {
            match poller.observe(&run)? {
                PollStep::Completed => break,
                PollStep::Dispatch(calls) => {
                    debug!("Run {} requested {} tool calls", run.id, calls.len());
                    if let Some(resumed) = self.executor.dispatch(thread_id, &run.id, &calls).await? {
                        run = resumed;
                        continue;
                    }
                }
                PollStep::Pending => {}
            }

            tokio::time::sleep(poller.next_delay()?).await;
            run = self.gateway.retrieve_run(thread_id, &run.id).await?;
        }

        info!(
            "Run {} completed after {} status checks",
            run.id,
            poller.attempts()
        );
        Ok(run)
    }

    /// Cancel a run the turn gave up on, so the thread accepts the next message
    async fn abandon_run(&self, thread_id: &str, run_id: &str, cause: &ShoppingError) {
        // already terminal on the gateway side
        if matches!(cause, ShoppingError::RunFailed { .. }) {
            return;
        }
        warn!("Cancelling run {} after error: {}", run_id, cause);
        if let Err(e) = self.gateway.cancel_run(thread_id, run_id).await {
            warn!("Failed to cancel run {}: {}", run_id, e);
        }
    }
}
