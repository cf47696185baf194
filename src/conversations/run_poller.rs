use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::PollingConfig;
use crate::error::{Result, ShoppingError};
use crate::gateway::{Run, RunStatus, ToolCallRequest};

/// Backoff schedule and limits for polling a run
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl From<&PollingConfig> for PollPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            initial_interval: Duration::from_millis(config.initial_interval_ms),
            max_interval: Duration::from_millis(config.max_interval_ms.max(config.initial_interval_ms)),
            multiplier: config.multiplier.max(1.0),
            max_attempts: config.max_attempts,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

/// What the conversation loop should do after observing a run
#[derive(Debug)]
pub enum PollStep {
    /// Not finished yet, poll again
    Pending,
    /// Run is paused on these tool calls
    Dispatch(Vec<ToolCallRequest>),
    Completed,
}

/// State machine over a single run's status lifecycle.
///
/// `observe` classifies the latest run state; `next_delay` hands out the wait
/// before the next status check and fails once the attempt budget or the
/// overall timeout is spent.
pub struct RunPoller {
    policy: PollPolicy,
    run_id: String,
    attempts: u32,
    interval: Duration,
    started: Instant,
    dispatched: HashSet<String>,
}

impl RunPoller {
    pub fn new(policy: PollPolicy, run_id: impl Into<String>) -> Self {
        Self {
            interval: policy.initial_interval,
            policy,
            run_id: run_id.into(),
            attempts: 0,
            started: Instant::now(),
            dispatched: HashSet::new(),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn observe(&mut self, run: &Run) -> Result<PollStep> {
        debug!("Run {} status: {}", self.run_id, run.status);
        match run.status {
            RunStatus::Completed => Ok(PollStep::Completed),
            RunStatus::RequiresAction => {
                let pending: Vec<ToolCallRequest> = run
                    .pending_tool_calls()
                    .iter()
                    .filter(|call| !self.dispatched.contains(&call.id))
                    .cloned()
                    .collect();
                if pending.is_empty() {
                    // Outputs already submitted, the gateway has not caught up yet
                    warn!("Run {} requires action with no new tool calls", self.run_id);
                    return Ok(PollStep::Pending);
                }
                self.dispatched.extend(pending.iter().map(|c| c.id.clone()));
                // A resumed run starts the backoff over
                self.interval = self.policy.initial_interval;
                Ok(PollStep::Dispatch(pending))
            }
            status if status.is_unsuccessful_terminal() => Err(ShoppingError::RunFailed {
                run_id: self.run_id.clone(),
                status,
                reason: run
                    .last_error
                    .as_ref()
                    .map(|e| format!("{}: {}", e.code, e.message))
                    .unwrap_or_else(|| "no error details".to_string()),
            }),
            _ => Ok(PollStep::Pending),
        }
    }

    /// Delay before the next status check
    pub fn next_delay(&mut self) -> Result<Duration> {
        if self.attempts >= self.policy.max_attempts
            || self.started.elapsed() + self.interval > self.policy.timeout
        {
            return Err(ShoppingError::RunTimedOut {
                run_id: self.run_id.clone(),
                attempts: self.attempts,
            });
        }

        self.attempts += 1;
        let delay = self.interval;
        self.interval = self
            .interval
            .mul_f64(self.policy.multiplier)
            .min(self.policy.max_interval);
        Ok(delay)
    }
}
