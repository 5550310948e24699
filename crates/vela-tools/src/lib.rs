//! Tool registry and invoker.
//!
//! Tools are a closed set of variants, each with a typed parameter schema
//! parsed from the turn text and looked up by intent label. Invocations
//! fan out concurrently, each with its own timeout; a failure or timeout
//! is recorded on the invocation and surfaced to generation as context
//! rather than aborting the turn.

pub mod crypto;
pub mod invoker;
pub mod registry;
pub mod schedule;
pub mod search;
pub mod time;
pub mod weather;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use invoker::Invoker;
pub use registry::{ToolRegistry, ToolRequest};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("tool timed out")]
    Timeout,

    #[error("tool transport error: {0}")]
    Transport(String),

    #[error("tool rejected request: {0}")]
    Rejected(String),

    #[error("invalid tool parameters: {0}")]
    InvalidParams(String),
}

impl ToolError {
    /// Transient failures are eligible for the single permitted retry;
    /// application-level rejections never are.
    pub fn is_transient(&self) -> bool {
        matches!(self, ToolError::Timeout | ToolError::Transport(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

/// Record of one tool execution. Owned by the invoker; never outlives the
/// originating turn's processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: String,
    pub params: serde_json::Value,
    pub status: InvocationStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl ToolInvocation {
    pub fn succeeded(&self) -> bool {
        self.status == InvocationStatus::Succeeded
    }

    /// One-line rendering for the generation prompt's TOOL RESULTS layer.
    pub fn prompt_line(&self) -> String {
        match self.status {
            InvocationStatus::Succeeded => format!(
                "{}: {}",
                self.tool,
                self.result
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            ),
            InvocationStatus::TimedOut => {
                format!("{}: unavailable (timed out)", self.tool)
            }
            _ => format!(
                "{}: failed ({})",
                self.tool,
                self.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// A tool that can be executed by the invoker.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, params: &serde_json::Value) -> Result<serde_json::Value, ToolError>;
}
