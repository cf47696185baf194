use thiserror::Error;

use crate::gateway::RunStatus;

#[derive(Error, Debug)]
pub enum ShoppingError {
    #[error("config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("gateway returned {status}: {message}")]
    Gateway { status: u16, message: String },

    #[error("unknown tool requested by assistant: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidToolArguments { tool: String, reason: String },

    #[error("tool schema mismatch: {0}")]
    ToolSchemaMismatch(String),

    #[error("assistant run {run_id} did not complete (status: {status}): {reason}")]
    RunFailed {
        run_id: String,
        status: RunStatus,
        reason: String,
    },

    #[error("assistant run {run_id} timed out after {attempts} status checks")]
    RunTimedOut { run_id: String, attempts: u32 },

    #[error("no assistant reply found on thread {0}")]
    NoAssistantReply(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("invalid image: {0}")]
    InvalidImage(String),
}

pub type Result<T> = std::result::Result<T, ShoppingError>;
