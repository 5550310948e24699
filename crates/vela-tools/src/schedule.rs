//! Social-post scheduling against the external scheduling backend.
//!
//! The backend owns approval and delivery; this tool only submits the
//! item. An unconfigured backend is an application-level rejection so the
//! model can explain it, not a transient failure to retry.

use async_trait::async_trait;
use tracing::info;

use crate::{Tool, ToolError};

pub struct SchedulePostTool {
    endpoint: String,
    http: reqwest::Client,
}

impl SchedulePostTool {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Tool for SchedulePostTool {
    fn name(&self) -> &str {
        "schedule_post"
    }

    async fn run(&self, params: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let content = params["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("missing content".into()))?;
        let at = params["at"].as_str().unwrap_or("now");

        if self.endpoint.is_empty() {
            return Err(ToolError::Rejected(
                "scheduling backend not configured".into(),
            ));
        }

        let response = self
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({ "content": content, "at": at }))
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::Rejected(format!(
                "scheduling backend returned HTTP {}",
                response.status()
            )));
        }

        info!(at, "post scheduled");
        Ok(serde_json::json!({ "scheduled": true, "at": at }))
    }
}
