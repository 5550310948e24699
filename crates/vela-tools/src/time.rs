//! Current time / timezone lookup via a timeapi.io-style endpoint, with a
//! local UTC fallback so the tool works offline for the default zone.

use async_trait::async_trait;
use chrono::Utc;

use crate::{Tool, ToolError};

pub struct CurrentTimeTool {
    endpoint: String,
    http: reqwest::Client,
}

impl CurrentTimeTool {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    async fn run(&self, params: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let timezone = params["timezone"].as_str().unwrap_or("UTC");

        if timezone.eq_ignore_ascii_case("utc") {
            return Ok(serde_json::json!({
                "timezone": "UTC",
                "datetime": Utc::now().to_rfc3339(),
            }));
        }

        let url = format!(
            "{}/api/time/current/zone",
            self.endpoint.trim_end_matches('/')
        );
        let response = self
            .http
            .get(url)
            .query(&[("timeZone", timezone)])
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::Rejected(format!(
                "time endpoint returned HTTP {} for zone {timezone}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        Ok(serde_json::json!({
            "timezone": timezone,
            "datetime": body["dateTime"],
        }))
    }
}
