//! Concurrent tool invocation with timeout and retry policy.
//!
//! Each planned call runs in its own task with its own timeout (fan-out,
//! not fan-through). A transient failure gets exactly one retry;
//! application-level rejections never do. All outcomes come back as
//! [`ToolInvocation`] records; a failure never aborts the turn.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::registry::{ToolRegistry, ToolRequest};
use crate::{InvocationStatus, Tool, ToolError, ToolInvocation};

pub struct Invoker {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl Invoker {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Execute every tool triggered by the matched intent labels.
    /// Resolves once all invocations have succeeded, failed, or timed out.
    pub async fn invoke(&self, labels: &[String], text: &str) -> Vec<ToolInvocation> {
        let planned = self.registry.plan(labels, text);
        if planned.is_empty() {
            return Vec::new();
        }

        let mut handles = Vec::with_capacity(planned.len());
        let mut immediate = Vec::new();

        for request in planned {
            match request {
                Ok(req) => {
                    let Some(tool) = self.registry.get(req.tool_name()).cloned() else {
                        continue;
                    };
                    let call_timeout = self.timeout;
                    handles.push(tokio::spawn(async move {
                        run_one(tool, req, call_timeout).await
                    }));
                }
                Err(e) => {
                    // Parameter extraction failed before any tool ran.
                    immediate.push(ToolInvocation {
                        tool: "unresolved".into(),
                        params: serde_json::Value::Null,
                        status: InvocationStatus::Failed,
                        result: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let mut invocations: Vec<ToolInvocation> = join_all(handles)
            .await
            .into_iter()
            .filter_map(|joined| joined.ok())
            .collect();
        invocations.extend(immediate);
        invocations
    }
}

async fn run_one(tool: Arc<dyn Tool>, request: ToolRequest, call_timeout: Duration) -> ToolInvocation {
    let params = request.params();
    let name = request.tool_name().to_string();

    let first = attempt(&tool, &params, call_timeout).await;
    let outcome = match first {
        Err(ref e) if e.is_transient() => {
            debug!(tool = %name, "transient tool failure, retrying once: {e}");
            attempt(&tool, &params, call_timeout).await
        }
        other => other,
    };

    match outcome {
        Ok(result) => ToolInvocation {
            tool: name,
            params,
            status: InvocationStatus::Succeeded,
            result: Some(result),
            error: None,
        },
        Err(e) => {
            warn!(tool = %name, "tool invocation failed: {e}");
            let status = match e {
                ToolError::Timeout => InvocationStatus::TimedOut,
                _ => InvocationStatus::Failed,
            };
            ToolInvocation {
                tool: name,
                params,
                status,
                result: None,
                error: Some(e.to_string()),
            }
        }
    }
}

async fn attempt(
    tool: &Arc<dyn Tool>,
    params: &serde_json::Value,
    call_timeout: Duration,
) -> Result<serde_json::Value, ToolError> {
    match timeout(call_timeout, tool.run(params)).await {
        Ok(result) => result,
        Err(_) => Err(ToolError::Timeout),
    }
}
