use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::{ToolInvocation, ToolRegistry};
use crate::error::Result;
use crate::gateway::{AgentGateway, Run, ToolCallRequest, ToolOutput};
use crate::search::{ProductSearch, SearchOutcome};

/// Runs the tool calls of a paused run and resumes it with their outputs
pub struct ToolExecutor {
    registry: ToolRegistry,
    gateway: Arc<dyn AgentGateway>,
    search: Arc<dyn ProductSearch>,
}

impl ToolExecutor {
    pub fn new(gateway: Arc<dyn AgentGateway>, search: Arc<dyn ProductSearch>) -> Self {
        Self {
            registry: ToolRegistry::new(),
            gateway,
            search,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Resolve every pending call, then submit all outputs in one batch.
    ///
    /// Calls are decoded before anything runs: an unknown tool or bad
    /// arguments fails the whole batch and nothing is submitted. Returns the
    /// run as reported by the gateway after the submission, or `None` for an
    /// empty batch, which submits nothing.
    pub async fn dispatch(
        &self,
        thread_id: &str,
        run_id: &str,
        calls: &[ToolCallRequest],
    ) -> Result<Option<Run>> {
        if calls.is_empty() {
            debug!("Run {} has no pending tool calls", run_id);
            return Ok(None);
        }

        let invocations = calls
            .iter()
            .map(|call| self.registry.parse(call))
            .collect::<Result<Vec<_>>>()?;

        let outputs: Vec<ToolOutput> = join_all(calls.iter().zip(invocations).map(
            |(call, invocation)| async move {
                ToolOutput {
                    tool_call_id: call.id.clone(),
                    output: self.execute(invocation).await,
                }
            },
        ))
        .await;

        info!(
            "Submitting {} tool outputs back to run {}",
            outputs.len(),
            run_id
        );
        let run = self
            .gateway
            .submit_tool_outputs(thread_id, run_id, outputs)
            .await?;
        Ok(Some(run))
    }

    async fn execute(&self, invocation: ToolInvocation) -> String {
        match invocation {
            ToolInvocation::SearchGoogleShopping { query } => {
                debug!("search_google_shopping(query={:?})", query);
                let outcome = self.search.search(&query).await;
                match &outcome {
                    SearchOutcome::Found { results, .. } => {
                        debug!("{} products for {:?}", results.len(), query)
                    }
                    SearchOutcome::Empty => debug!("No products for {:?}", query),
                    SearchOutcome::TransientFailure(reason) => {
                        warn!("Search for {:?} failed: {}", query, reason)
                    }
                    SearchOutcome::NotConfigured => {
                        debug!("Search not configured, answering {:?} with nothing", query)
                    }
                }
                outcome.into_tool_text()
            }
        }
    }
}
